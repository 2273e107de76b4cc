//! Metadata forwarded alongside a resolved stream
//!
//! Season and episode numbers are read from release-style titles
//! (`S01E05`, `S1E105`) or from a Russian "Сезон N" season marker.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Metadata the host attaches to a playback item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub title: String,
    pub imdb_id: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl StreamMetadata {
    /// Builds metadata from a (possibly percent-encoded) title
    ///
    /// # Example
    /// ```
    /// use treetv_core::StreamMetadata;
    /// let meta = StreamMetadata::from_title("Doctor Who S07E05");
    /// assert_eq!(meta.season, Some(7));
    /// assert_eq!(meta.episode, Some(5));
    /// ```
    pub fn from_title(title: &str) -> Self {
        let title = decode_title(title);
        let (season, episode) = match extract_season_episode(&title) {
            Some((season, episode)) => (Some(season), Some(episode)),
            None => (extract_season(&title), None),
        };

        Self {
            title,
            imdb_id: None,
            season,
            episode,
        }
    }

    pub fn with_imdb_id(mut self, imdb_id: Option<String>) -> Self {
        self.imdb_id = imdb_id.filter(|id| !id.trim().is_empty());
        self
    }
}

fn decode_title(title: &str) -> String {
    urlencoding::decode(title)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| title.to_string())
        .trim()
        .to_string()
}

/// Extracts `(season, episode)` from `SxxEyyy` or `SxxEyy` markers
pub fn extract_season_episode(title: &str) -> Option<(u32, u32)> {
    let upper = title.to_uppercase();
    // Three-digit episodes first so "S1E105" is not read as episode 10.
    for pattern in [r"S(\d{1,2})E(\d{3})", r"S(\d{1,2})E(\d{2})"] {
        if let Ok(re) = Regex::new(pattern)
            && let Some(caps) = re.captures(&upper)
            && let (Some(season), Some(episode)) = (caps.get(1), caps.get(2))
            && let (Ok(season), Ok(episode)) =
                (season.as_str().parse::<u32>(), episode.as_str().parse::<u32>())
        {
            return Some((season, episode));
        }
    }
    None
}

/// Extracts a season number from a "Сезон N" marker
pub fn extract_season(title: &str) -> Option<u32> {
    let re = Regex::new(r"Сезон (\d+)").ok()?;
    re.captures(title)?.get(1)?.as_str().parse().ok()
}
