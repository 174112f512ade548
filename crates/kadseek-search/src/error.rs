//! Error types for the search engine.
//!
//! Per-search conditions (unknown targets, duplicate files, denied sends,
//! full result sinks) are absorbed and logged where they happen and never
//! show up here. What remains are failures a caller has to act on.

use kadseek_proto::ProtoError;
use thiserror::Error;

/// Result alias for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors surfaced by the search engine and its service loop
#[derive(Debug, Error)]
pub enum SearchError {
    /// Wire decoding or encoding failed
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// Socket or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Local network identity could not be determined
    #[error("local identity unavailable: {0}")]
    LocalIdentity(String),

    /// The service loop is no longer running
    #[error("search service stopped")]
    ServiceStopped,
}

impl SearchError {
    /// Whether the process cannot continue after this error
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::LocalIdentity(_) | Self::Io(_))
    }
}
