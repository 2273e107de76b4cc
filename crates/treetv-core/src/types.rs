//! Core data types for the tree.tv unlock flow
//!
//! Input handed over by the catalog layer and the playback item returned to it.

use serde::{Deserialize, Serialize};

use crate::metadata::StreamMetadata;
use crate::playlist::ResolvedStream;

/// A play request coming from the catalog layer
///
/// All fields implement Serialize and Deserialize for Tauri compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    /// Player locator, e.g. "/player/1503/21"
    pub locator: String,

    /// Title shown in the catalog (may be percent-encoded)
    pub title: String,

    /// Catalog page the item was found on, e.g. "/film/1503-title"
    pub referer: String,

    /// External catalog id, forwarded untouched
    #[serde(default)]
    pub imdb_id: Option<String>,
}

/// Resolved stream plus the metadata the host needs to play it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackItem {
    pub stream: ResolvedStream,
    pub metadata: StreamMetadata,

    /// Opaque URI identifying this item to the host
    pub canonical_url: String,
}

impl PlaybackItem {
    /// Renders the host's `videoparams:` playback descriptor
    pub fn video_params(&self) -> String {
        let params = serde_json::json!({
            "title": self.metadata.title,
            "canonicalUrl": self.canonical_url,
            "imdbid": self.metadata.imdb_id,
            "season": self.metadata.season,
            "episode": self.metadata.episode,
            "sources": [{
                "url": self.stream.url,
                "mimetype": self.stream.mimetype,
            }],
            "no_fs_scan": true,
        });
        format!("videoparams:{}", params)
    }
}
