//! Tauri commands for tree.tv stream unlocking

use std::collections::HashMap;

use tauri::State;
use treetv_core::{PlayRequest, PlaybackItem};

use crate::DriverState;

/// Unlock a stream and return the playable item
///
/// # Errors
/// Returns error message as String if unlocking fails
#[tauri::command]
pub async fn resolve_stream(
    state: State<'_, DriverState>,
    locator: String,
    title: String,
    referer: String,
    imdb_id: Option<String>,
) -> Result<PlaybackItem, String> {
    let request = PlayRequest {
        locator,
        title,
        referer,
        imdb_id,
    };
    state
        .driver
        .resolve(&request)
        .await
        .map_err(|e| e.to_string())
}

/// Unlock a stream and return the host's `videoparams:` descriptor
#[tauri::command]
pub async fn video_params(
    state: State<'_, DriverState>,
    locator: String,
    title: String,
    referer: String,
    imdb_id: Option<String>,
) -> Result<String, String> {
    let item = resolve_stream(state, locator, title, referer, imdb_id).await?;
    Ok(item.video_params())
}

/// Headers the media player must send when fetching `url`
///
/// Empty until a stream on that host has been unlocked.
#[tauri::command]
pub async fn stream_headers(
    state: State<'_, DriverState>,
    url: String,
) -> Result<HashMap<String, String>, String> {
    let headers = state
        .driver
        .stream_headers(&url)
        .map_err(|e| e.to_string())?;
    Ok(headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect())
}
