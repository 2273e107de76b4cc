//! URL helper functions for tree.tv
//!
//! Provides locator parsing and builders for the imprint, guard and
//! playlist endpoints.

use regex::Regex;
use reqwest::Url;

use crate::error::{Result, TreeTvError};

/// Identifies one playable file on the player host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayLocator {
    pub file_id: String,
    pub source_id: String,
}

/// Extracts file and source ids from a player locator
///
/// Accepts `/{route}/{file}/{source}` paths (optionally with a host and query,
/// optionally percent-encoded) as well as bare `{file}/{source}` pairs.
///
/// # Example
/// ```
/// use treetv_core::url::parse_locator;
/// let locator = parse_locator("/player/1503/21").unwrap();
/// assert_eq!(locator.file_id, "1503");
/// assert_eq!(locator.source_id, "21");
/// ```
pub fn parse_locator(locator: &str) -> Option<PlayLocator> {
    let decoded = urlencoding::decode(locator).ok()?;

    // Drop scheme and host if present
    let path = match decoded.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
        None => &*decoded,
    };

    let path = path.split(['?', '#']).next().unwrap_or(path);
    let parts: Vec<&str> = path.trim_matches('/').split('/').collect();

    let (file_id, source_id) = match parts.as_slice() {
        [file, source] => (*file, *source),
        [_, file, source, ..] => (*file, *source),
        _ => return None,
    };

    if file_id.is_empty() || source_id.is_empty() {
        return None;
    }

    Some(PlayLocator {
        file_id: file_id.to_string(),
        source_id: source_id.to_string(),
    })
}

/// Builds the fingerprint registration URL on the catalog host
pub fn imprint_url(base_url: &str) -> String {
    format!("{}/film/index/imprint", base_url.trim_end_matches('/'))
}

/// Builds the key-submission URL on the player host
pub fn guard_url(player_url: &str) -> String {
    format!("{}/guard", player_url.trim_end_matches('/'))
}

/// Builds the playlist URL on the player host
pub fn playlist_url(player_url: &str) -> String {
    format!("{}/guard/guard/", player_url.trim_end_matches('/'))
}

/// Builds the player page URL the guard expects as `Referer`
///
/// # Example
/// ```
/// use treetv_core::url::{player_referer, PlayLocator};
/// let locator = PlayLocator { file_id: "1503".into(), source_id: "21".into() };
/// assert_eq!(
///     player_referer("http://player.tree.tv", &locator),
///     "http://player.tree.tv/?file=1503&source=21&user=false"
/// );
/// ```
pub fn player_referer(player_url: &str, locator: &PlayLocator) -> String {
    format!(
        "{}/?file={}&source={}&user=false",
        player_url.trim_end_matches('/'),
        urlencoding::encode(&locator.file_id),
        urlencoding::encode(&locator.source_id)
    )
}

/// Builds a full catalog URL from a path-only referer
pub fn catalog_referer(base_url: &str, referer: &str) -> String {
    if referer.starts_with("http://") || referer.starts_with("https://") {
        return referer.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        referer.trim_start_matches('/')
    )
}

/// Value for a `Host` header addressing `url` (host plus explicit port)
pub fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Scheme and authority of `url`, e.g. `http://player.tree.tv`
pub fn origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Regex matching every URL on the same host as `url`
///
/// # Errors
/// Returns `InvalidUrl` if `url` has no host
pub fn host_pattern(url: &str) -> Result<Regex> {
    let parsed = parse_url(url)?;
    let host = host_header(&parsed).ok_or_else(|| TreeTvError::InvalidUrl(url.to_string()))?;
    Regex::new(&format!(r".*{}.*", regex::escape(&host)))
        .map_err(|e| TreeTvError::InvalidUrl(format!("{}: {}", url, e)))
}

/// Parses `url`, mapping failures to `InvalidUrl`
pub fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| TreeTvError::InvalidUrl(format!("{}: {}", url, e)))
}
