//! tree.tv Tauri Integration
//!
//! Provides a Tauri plugin exposing tree.tv stream unlocking to the frontend.
//!
//! # Usage
//!
//! Register the plugin in your Tauri application:
//!
//! ```ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(treetv_tauri::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//!
//! Then invoke commands from the frontend:
//!
//! ```javascript
//! import { invoke } from '@tauri-apps/api/core';
//!
//! // Unlock a stream
//! const item = await invoke('plugin:treetv|resolve_stream', {
//!   locator: '/player/1503/21',
//!   title: 'Doctor Who S07E05',
//!   referer: '/film/1503-doctor-who',
//!   imdbId: null
//! });
//!
//! // Headers the player must send when fetching segments
//! const headers = await invoke('plugin:treetv|stream_headers', { url: item.stream.url });
//! ```

use std::sync::Arc;

use tauri::{
    Manager, Runtime,
    plugin::{Builder, TauriPlugin},
};
use treetv_core::UnlockDriver;

mod commands;

/// Shared unlock driver
///
/// The driver is `Sync` and keeps the session cookie, so one instance serves
/// every command; concurrent unlocks share a single session.
pub struct DriverState {
    pub(crate) driver: Arc<UnlockDriver>,
}

impl DriverState {
    /// Create a new DriverState with default configuration
    ///
    /// # Errors
    /// Returns error string if driver initialization fails
    pub fn new() -> Result<Self, String> {
        let driver = UnlockDriver::new().map_err(|e| e.to_string())?;
        Ok(Self {
            driver: Arc::new(driver),
        })
    }
}

/// Initialize the treetv plugin
///
/// # Example
/// ```ignore
/// tauri::Builder::default()
///     .plugin(treetv_tauri::init())
///     .run(tauri::generate_context!())
///     .expect("error while running tauri application");
/// ```
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("treetv")
        .invoke_handler(tauri::generate_handler![
            commands::resolve_stream,
            commands::video_params,
            commands::stream_headers
        ])
        .setup(|app, _api| {
            let state = DriverState::new().map_err(Box::<dyn std::error::Error>::from)?;
            app.manage(state);
            Ok(())
        })
        .build()
}

// Re-export types for convenience
pub use treetv_core::{PlaybackItem, ResolvedStream, StreamMetadata};
