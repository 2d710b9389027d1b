//! Manifest fetching
//!
//! Retrieves the remote JSON manifest and turns it into image descriptors.

use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::connectivity::ConnectivityMonitor;
use super::transport::DynTransport;
use crate::error::FetchError;
use crate::state::data::ImageDescriptor;

const KEY_NAME: &str = "imageName";
const KEY_DESCRIPTION: &str = "imageDescription";
const KEY_URL: &str = "imageURL";

pub struct ManifestFetcher {
    url: String,
    transport: DynTransport,
    connectivity: Arc<ConnectivityMonitor>,
}

impl ManifestFetcher {
    pub fn new(
        url: impl Into<String>,
        transport: DynTransport,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            url: url.into(),
            transport,
            connectivity,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the manifest.
    ///
    /// Fails fast with `FetchError::NoNetwork` when the host is unreachable
    /// instead of issuing a request that would only time out.
    pub async fn fetch(&self) -> Result<Vec<ImageDescriptor>, FetchError> {
        if !self.connectivity.is_reachable() {
            warn!("Skipping manifest fetch: {} is unreachable", self.connectivity.hostname());
            return Err(FetchError::NoNetwork);
        }

        info!("Fetching manifest from {}", self.url);

        let response = self.transport.get(&self.url).await.map_err(|e| {
            error!("Failed to fetch manifest: {}", e);
            e
        })?;

        if !response.is_success() {
            error!("Manifest request failed with status {}", response.status);
            return Err(FetchError::Status(response.status));
        }

        let descriptors = parse_manifest(&response.body)?;
        info!("Manifest lists {} images", descriptors.len());
        Ok(descriptors)
    }
}

/// Parse a manifest body.
///
/// The top level must be a JSON array. Each object in it becomes a
/// descriptor; keys that are missing or not strings come out as `None`.
/// Array entries that are not objects are skipped.
pub fn parse_manifest(body: &[u8]) -> Result<Vec<ImageDescriptor>, FetchError> {
    let json: Value = serde_json::from_slice(body).map_err(|e| {
        error!("Failed to parse manifest JSON: {}", e);
        FetchError::Parse(e.to_string())
    })?;

    let entries = json
        .as_array()
        .ok_or_else(|| FetchError::Parse("expected a JSON array at the top level".to_string()))?;

    let mut descriptors = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        // Non-object entries carry nothing we can use
        let Some(fields) = entry.as_object() else {
            warn!("Skipping manifest entry {}: not an object", index);
            continue;
        };

        let text = |key: &str| {
            fields
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        descriptors.push(ImageDescriptor {
            name: text(KEY_NAME),
            description: text(KEY_DESCRIPTION),
            source_url: text(KEY_URL),
        });
    }

    Ok(descriptors)
}
