use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::imaging::thumbnail::THUMBNAIL_MAX_EDGE;
use crate::state::Catalog;

/// Manifest listing every image in the gallery
pub const DEFAULT_MANIFEST_URL: &str =
    "https://hinge-homework.s3.amazonaws.com/client/services/homework.json";

/// Settings for one gallery instance.
///
/// Every field has a default, so a partial JSON document deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub manifest_url: String,
    /// Host whose reachability gates network loads.
    /// When unset, the manifest URL's host is used.
    pub reachability_host: Option<String>,
    pub db_path: PathBuf,
    pub thumbnail_max_edge: u32,
    /// Cap on concurrent image downloads
    pub max_concurrent_fetches: usize,
    /// Number of URLs kept in the in-memory image cache
    pub image_cache_capacity: usize,
    pub probe_interval_secs: u64,
    pub probe_port: u16,
    pub probe_timeout_secs: u64,
    /// Buffer size of the event channel
    pub event_capacity: usize,
    pub user_agent: String,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            reachability_host: None,
            db_path: Catalog::default_path().unwrap_or_else(|| PathBuf::from("hinge-gallery.db")),
            thumbnail_max_edge: THUMBNAIL_MAX_EDGE,
            max_concurrent_fetches: 8,
            image_cache_capacity: 256,
            probe_interval_secs: 30,
            probe_port: 443,
            probe_timeout_secs: 5,
            event_capacity: 1024,
            user_agent: concat!("hinge-gallery/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl GalleryConfig {
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    /// Host to monitor: the explicit setting, else the manifest's host.
    /// Returns an empty string when neither is usable, which the monitor
    /// treats as permanently unreachable.
    pub fn reachability_host(&self) -> String {
        if let Some(host) = &self.reachability_host {
            return host.clone();
        }
        url::Url::parse(&self.manifest_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    /// Parse a JSON config document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_host_comes_from_manifest() {
        let config = GalleryConfig::default();
        assert_eq!(config.reachability_host(), "hinge-homework.s3.amazonaws.com");
        assert_eq!(config.thumbnail_max_edge, 300);
    }

    #[test]
    fn test_explicit_host_wins() {
        let config = GalleryConfig {
            reachability_host: Some("cdn.example.com".to_string()),
            ..GalleryConfig::default()
        };
        assert_eq!(config.reachability_host(), "cdn.example.com");
    }

    #[test]
    fn test_unparseable_manifest_url_gives_empty_host() {
        let config = GalleryConfig::default().with_manifest_url("not a url");
        assert_eq!(config.reachability_host(), "");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            GalleryConfig::from_json(r#"{"db_path": "/tmp/g.db", "max_concurrent_fetches": 2}"#)
                .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/g.db"));
        assert_eq!(config.max_concurrent_fetches, 2);
        assert_eq!(config.manifest_url, DEFAULT_MANIFEST_URL);
        assert_eq!(config.image_cache_capacity, 256);
    }
}
