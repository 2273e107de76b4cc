//! Playlist reply parsing and stream selection
//!
//! The guard answers an accepted key with a JSON playlist. Under normal
//! operation it also emits a malformed near-JSON body that still carries a
//! usable `"src": "..."` literal, so parsing is a two-step chain: structured
//! JSON first, literal extraction second.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// MIME type announced for HLS playlists
pub const HLS_MIMETYPE: &str = "application/vnd.apple.mpegurl";

/// MIME type announced for direct files
pub const VIDEO_MIMETYPE: &str = "video/quicktime";

/// Prefix telling the player to treat the URL as an HLS stream
pub const HLS_PREFIX: &str = "hls:";

/// Path segment marking an HLS playlist URL
const PLAYLIST_MARKER: &str = "/playlist/";

/// One candidate source inside a playlist entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaylistSource {
    /// File id this source belongs to
    #[serde(default, deserialize_with = "loose_string")]
    pub point: String,
    pub src: String,
}

/// One playlist entry: a group of sources
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub sources: Vec<PlaylistSource>,
}

/// Accepted playlist reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistReply {
    /// Well-formed playlist
    Entries(Vec<PlaylistEntry>),
    /// Link recovered from a malformed body; used as-is
    Link(String),
}

impl PlaylistReply {
    /// Parses a playlist reply, structured first, literal extraction second
    ///
    /// Returns `None` when neither strategy succeeds (the guard rejected the key).
    pub fn parse(body: &str) -> Option<Self> {
        parse_entries(body)
            .map(PlaylistReply::Entries)
            .or_else(|| extract_src_literal(body).map(PlaylistReply::Link))
    }

    /// Picks the link for `file_id` (see [`select_link`])
    pub fn link_for(&self, file_id: &str) -> Option<String> {
        match self {
            Self::Entries(entries) => select_link(entries, file_id).map(str::to_string),
            Self::Link(link) => Some(link.clone()),
        }
    }
}

/// Structured strategy: a JSON array of playlist entries
pub fn parse_entries(body: &str) -> Option<Vec<PlaylistEntry>> {
    serde_json::from_str(body.trim()).ok()
}

/// Fallback strategy: the first `"src": "..."` literal in the body
///
/// JSON-escaped slashes are unescaped.
pub fn extract_src_literal(body: &str) -> Option<String> {
    let re = Regex::new(r#""src"\s*:\s*"([^"]+)""#).ok()?;
    let caps = re.captures(body)?;
    let link = caps.get(1)?.as_str().replace("\\/", "/");
    Some(link)
}

/// Picks the source whose `point` equals `file_id`
///
/// Falls back to the first source of the first entry; the guard does not
/// always tag sources with the requested point.
pub fn select_link<'a>(entries: &'a [PlaylistEntry], file_id: &str) -> Option<&'a str> {
    entries
        .iter()
        .flat_map(|entry| entry.sources.iter())
        .find(|source| source.point == file_id)
        .or_else(|| entries.first().and_then(|entry| entry.sources.first()))
        .map(|source| source.src.as_str())
}

fn loose_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Final playable stream handed to the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStream {
    pub url: String,
    pub mimetype: String,
}

impl ResolvedStream {
    /// Classifies `link` as HLS playlist or direct file
    ///
    /// # Example
    /// ```
    /// use treetv_core::ResolvedStream;
    /// let stream = ResolvedStream::classify("http://s1.3tv.im/playlist/1503.m3u8");
    /// assert_eq!(stream.url, "hls:http://s1.3tv.im/playlist/1503.m3u8");
    /// assert_eq!(stream.mimetype, "application/vnd.apple.mpegurl");
    /// ```
    pub fn classify(link: &str) -> Self {
        if link.contains(PLAYLIST_MARKER) {
            Self {
                url: format!("{}{}", HLS_PREFIX, link),
                mimetype: HLS_MIMETYPE.to_string(),
            }
        } else {
            Self {
                url: link.to_string(),
                mimetype: VIDEO_MIMETYPE.to_string(),
            }
        }
    }

    pub fn is_hls(&self) -> bool {
        self.mimetype == HLS_MIMETYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = r#"[
        {"sources": [
            {"point": "1500", "src": "http://s1.3tv.im/files/1500.mp4"},
            {"point": "1503", "src": "http://s1.3tv.im/playlist/1503.m3u8"}
        ]},
        {"sources": [{"point": 1504, "src": "http://s1.3tv.im/files/1504.mp4"}]}
    ]"#;

    #[test]
    fn test_parse_entries() {
        let entries = parse_entries(PLAYLIST).expect("valid playlist");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sources.len(), 2);
        assert_eq!(entries[1].sources[0].point, "1504");
    }

    #[test]
    fn test_parse_entries_rejects_non_playlist() {
        assert!(parse_entries("<html>denied</html>").is_none());
        assert!(parse_entries(r#"{"error": "bad skc"}"#).is_none());
    }

    #[test]
    fn test_extract_src_literal() {
        let body = r#"[{"sources":[{"point":"1503","src":"http:\/\/s1.3tv.im\/playlist\/1503.m3u8"}],}"#;
        assert_eq!(
            extract_src_literal(body).as_deref(),
            Some("http://s1.3tv.im/playlist/1503.m3u8")
        );
    }

    #[test]
    fn test_extract_src_literal_tolerates_spacing() {
        let body = r#"garbage "src" :  "http://s1.3tv.im/files/1.mp4" garbage"#;
        assert_eq!(
            extract_src_literal(body).as_deref(),
            Some("http://s1.3tv.im/files/1.mp4")
        );
    }

    #[test]
    fn test_extract_src_literal_none() {
        assert!(extract_src_literal("Access denied").is_none());
    }

    #[test]
    fn test_reply_prefers_structured_parse() {
        let reply = PlaylistReply::parse(PLAYLIST).expect("accepted");
        assert!(matches!(reply, PlaylistReply::Entries(_)));
    }

    #[test]
    fn test_reply_falls_back_to_literal() {
        let reply = PlaylistReply::parse(r#"[{"sources":[{"src":"http://a/b.mp4"}]"#).expect("accepted");
        assert_eq!(reply, PlaylistReply::Link("http://a/b.mp4".to_string()));
        assert_eq!(reply.link_for("anything").as_deref(), Some("http://a/b.mp4"));
    }

    #[test]
    fn test_reply_rejected() {
        assert!(PlaylistReply::parse("Access denied").is_none());
        assert!(PlaylistReply::parse("").is_none());
    }

    #[test]
    fn test_select_link_exact_point() {
        let entries = parse_entries(PLAYLIST).unwrap();
        assert_eq!(
            select_link(&entries, "1503"),
            Some("http://s1.3tv.im/playlist/1503.m3u8")
        );
        assert_eq!(
            select_link(&entries, "1504"),
            Some("http://s1.3tv.im/files/1504.mp4")
        );
    }

    #[test]
    fn test_select_link_falls_back_to_first_source() {
        let entries = parse_entries(PLAYLIST).unwrap();
        assert_eq!(
            select_link(&entries, "9999"),
            Some("http://s1.3tv.im/files/1500.mp4")
        );
    }

    #[test]
    fn test_select_link_empty() {
        assert_eq!(select_link(&[], "1503"), None);
        let entries = vec![PlaylistEntry { sources: vec![] }];
        assert_eq!(select_link(&entries, "1503"), None);
    }

    #[test]
    fn test_classify_playlist() {
        let stream = ResolvedStream::classify("http://s1.3tv.im/playlist/1503.m3u8");
        assert_eq!(stream.url, "hls:http://s1.3tv.im/playlist/1503.m3u8");
        assert_eq!(stream.mimetype, HLS_MIMETYPE);
        assert!(stream.is_hls());
    }

    #[test]
    fn test_classify_direct_file() {
        let stream = ResolvedStream::classify("http://s1.3tv.im/files/1500.mp4");
        assert_eq!(stream.url, "http://s1.3tv.im/files/1500.mp4");
        assert_eq!(stream.mimetype, VIDEO_MIMETYPE);
        assert!(!stream.is_hls());
    }
}
