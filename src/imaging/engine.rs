use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::placeholder::placeholder_pair;
use super::thumbnail::generate_thumbnail;
use crate::net::transport::DynTransport;
use crate::state::data::{ImagePair, ImagePayload};

/// Downloads images, scales thumbnails and keeps both in memory.
///
/// Failures never surface: a bad status, an empty body or undecodable
/// bytes all resolve to the placeholder pair so one broken URL cannot
/// stall the rest of the gallery. There is no retry and no timeout
/// beyond what the transport applies.
pub struct ImageEngine {
    transport: DynTransport,
    cache: Mutex<LruCache<String, ImagePair>>,
    max_edge: u32,
}

impl ImageEngine {
    /// `cache_capacity` is the number of URLs kept in memory (at least 1)
    pub fn new(transport: DynTransport, cache_capacity: usize, max_edge: u32) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            transport,
            cache: Mutex::new(LruCache::new(capacity)),
            max_edge,
        }
    }

    pub fn max_edge(&self) -> u32 {
        self.max_edge
    }

    /// Get the full image and thumbnail for `url`
    ///
    /// 1. Serve from the in-memory cache if present (no network)
    /// 2. Otherwise download, decode and scale
    /// 3. Substitute the placeholder on any failure
    /// 4. Cache whatever came out of 2 or 3
    pub async fn fetch_and_scale(&self, url: &str) -> ImagePair {
        if let Some(pair) = self.cache_lock().get(url).cloned() {
            debug!("Image cache hit: {}", url);
            return pair;
        }

        let pair = match self.download(url).await {
            Ok(pair) => pair,
            Err(reason) => {
                warn!("Using placeholder for {}: {}", url, reason);
                placeholder_pair(self.max_edge)
            }
        };

        self.cache_lock().put(url.to_string(), pair.clone());
        pair
    }

    /// Check the cache without touching recency
    pub fn is_cached(&self, url: &str) -> bool {
        self.cache_lock().contains(url)
    }

    pub fn cached_len(&self) -> usize {
        self.cache_lock().len()
    }

    async fn download(&self, url: &str) -> Result<ImagePair, String> {
        let response = self
            .transport
            .get(url)
            .await
            .map_err(|e| e.to_string())?;

        if response.status != 200 {
            return Err(format!("HTTP status {}", response.status));
        }
        if response.body.is_empty() {
            return Err("empty response body".to_string());
        }

        // Decoding and resampling are CPU-bound
        let max_edge = self.max_edge;
        tokio::task::spawn_blocking(move || decode_and_scale(response.body, max_edge))
            .await
            .map_err(|e| format!("Task join error: {}", e))?
    }

    fn cache_lock(&self) -> MutexGuard<'_, LruCache<String, ImagePair>> {
        // The cache holds plain values, so a poisoned lock is still usable
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Decode downloaded bytes and build the pair; the full image keeps the original encoding
fn decode_and_scale(bytes: Vec<u8>, max_edge: u32) -> Result<ImagePair, String> {
    let img = image::load_from_memory(&bytes).map_err(|e| format!("Failed to decode image: {}", e))?;

    let thumbnail = generate_thumbnail(&img, max_edge)
        .map_err(|e| format!("Failed to encode thumbnail: {}", e))?;

    debug!(
        "Scaled {}x{} image to {}x{}",
        img.width(),
        img.height(),
        thumbnail.width(),
        thumbnail.height()
    );

    Ok(ImagePair {
        full: ImagePayload::new(bytes, img.width(), img.height()),
        thumbnail,
    })
}

impl std::fmt::Debug for ImageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageEngine")
            .field("max_edge", &self.max_edge)
            .field("cached", &self.cached_len())
            .finish()
    }
}
