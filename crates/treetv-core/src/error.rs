//! Error types for the tree.tv unlock flow
//!
//! Provides a single error enum with human-readable messages
//! and Tauri-compatible serialization.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Error type for all tree.tv operations
///
/// Implements Display for human-readable messages and Serialize
/// for Tauri command compatibility.
#[derive(Error, Debug)]
pub enum TreeTvError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to parse a response that is not part of the guard exchange
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration value outside its valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Locator does not contain a file id and a source id
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// Rate limited by server (HTTP 429)
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Resource or playlist source not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The guard answered the key submission with something that is not JSON.
    ///
    /// Never retried: the gate contract changed.
    #[error("Can't convert to json the response: {body}")]
    ProtocolDesync { body: String },

    /// The guard kept rejecting the shared key until the attempt budget ran out
    #[error("Can't get the playlist link after {attempts} attempts")]
    GuardRejected { attempts: u32 },
}

impl Serialize for TreeTvError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for tree.tv operations
pub type Result<T> = std::result::Result<T, TreeTvError>;
