//! Error types for each layer of the pipeline
//!
//! - `FetchError` covers the network side (manifest and image endpoints)
//! - `CatalogError` covers the SQLite catalog
//! - `GalleryError` is what the coordinator hands back to its caller

use crate::state::data::RecordId;
use thiserror::Error;

/// Failures talking to the manifest or image endpoints
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The reachability host is down, so no request was issued
    #[error("network unavailable")]
    NoNetwork,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed manifest: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

/// Failures reading from or committing to the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image record {0} not found")]
    NotFound(RecordId),

    /// Image fields are write-once
    #[error("image record {0} already has its images")]
    AlreadyLoaded(RecordId),
}

/// Errors surfaced by the gallery coordinator
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("network unavailable")]
    NetworkUnavailable,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("persistence failure: {0}")]
    Persistence(#[from] CatalogError),
}

impl GalleryError {
    /// True when the operation was refused because the host is unreachable
    pub fn is_network_unavailable(&self) -> bool {
        matches!(
            self,
            GalleryError::NetworkUnavailable | GalleryError::Fetch(FetchError::NoNetwork)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_network_counts_as_unavailable() {
        assert!(GalleryError::NetworkUnavailable.is_network_unavailable());
        assert!(GalleryError::Fetch(FetchError::NoNetwork).is_network_unavailable());
        assert!(!GalleryError::Fetch(FetchError::Status(500)).is_network_unavailable());
    }

    #[test]
    fn test_catalog_error_messages() {
        assert_eq!(CatalogError::NotFound(7).to_string(), "image record 7 not found");
        assert_eq!(
            CatalogError::AlreadyLoaded(3).to_string(),
            "image record 3 already has its images"
        );
    }
}
