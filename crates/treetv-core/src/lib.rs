//! tree.tv Stream Unlock Core Library
//!
//! Provides an async API for turning tree.tv player locators into playable stream URLs.
//!
//! # Overview
//!
//! tree.tv hides its playlists behind an anti-bot guard. Unlocking a stream takes:
//! - A session cookie: the MurmurHash3 x64-128 digest of a browser fingerprint,
//!   registered once per session through the imprint endpoint
//! - A key exchange with the guard (modular exponentiation over small floats),
//!   resynchronizing whenever the guard announces new parameters
//! - The playlist request, authenticated by the shared key
//!
//! The session cookie and the player referer must also accompany every segment
//! fetch; [`UnlockDriver::stream_headers`] exposes them to the media player.
//!
//! # Example
//!
//! ```no_run
//! use treetv_core::{PlayRequest, Result, UnlockDriver};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let driver = UnlockDriver::new()?;
//!
//!     let item = driver
//!         .resolve(&PlayRequest {
//!             locator: "/player/1503/21".to_string(),
//!             title: "Doctor Who S07E05".to_string(),
//!             referer: "/film/1503-doctor-who".to_string(),
//!             imdb_id: None,
//!         })
//!         .await?;
//!
//!     println!("{} ({})", item.stream.url, item.stream.mimetype);
//!     for (name, value) in &driver.stream_headers(&item.stream.url)? {
//!         println!("{}: {:?}", name, value);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Stream URLs
//!
//! HLS playlists are returned with an `hls:` prefix. Links are short-lived and
//! bound to the session cookie; do not cache them across sessions.

pub mod challenge;
mod client;
mod error;
pub mod fingerprint;
pub mod hash;
mod interceptor;
pub mod metadata;
pub mod playlist;
mod session;
mod types;
mod unlock;
pub mod url;

// Re-export client types
pub use client::{ClientConfig, GuardConfig, RateLimiter, TreeTvClient};

// Re-export error types
pub use error::{Result, TreeTvError};

// Re-export session building blocks
pub use fingerprint::{Fingerprint, SessionCookie};
pub use interceptor::{InterceptorRegistry, OutboundRequest};
pub use session::Session;

// Re-export main unlock API
pub use unlock::UnlockDriver;

// Re-export data types
pub use metadata::StreamMetadata;
pub use playlist::ResolvedStream;
pub use types::{PlayRequest, PlaybackItem};
pub use url::{PlayLocator, parse_locator};
