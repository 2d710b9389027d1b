//! Shared data structures for the gallery state
//!
//! These structs represent the data model that flows between
//! the network layer, the catalog and the UI collaborator.

use std::fmt;
use std::sync::Arc;

/// Database ID of an image record
pub type RecordId = i64;

/// One raw entry from the remote manifest
///
/// Every field is optional: a manifest entry missing a key still
/// produces a descriptor instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// `imageName` in the manifest
    pub name: Option<String>,
    /// `imageDescription` in the manifest
    pub description: Option<String>,
    /// `imageURL` in the manifest; the natural key of a record
    pub source_url: Option<String>,
}

impl ImageDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            source_url: Some(source_url.into()),
        }
    }
}

/// An encoded image held in memory
///
/// The bytes are shared, so cloning a payload into an event or a
/// working-set snapshot does not copy the image.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Arc<[u8]>>, width: u32, height: u32) -> Self {
        Self {
            bytes: bytes.into(),
            width,
            height,
        }
    }

    /// Encoded image bytes (PNG for thumbnails, as-downloaded for full images)
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Decode the payload back into pixels
    pub fn decode(&self) -> image::ImageResult<image::DynamicImage> {
        image::load_from_memory(&self.bytes)
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("len", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Full image plus its thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub full: ImagePayload,
    pub thumbnail: ImagePayload,
}

/// Represents a single image in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Unique database ID
    pub id: RecordId,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Where the full image is downloaded from
    pub source_url: Option<String>,
    /// Downloaded image (None while the fetch is in flight)
    pub full_image: Option<ImagePayload>,
    /// Scaled thumbnail (None while the fetch is in flight)
    pub thumbnail: Option<ImagePayload>,
    /// Unix timestamp of insertion
    pub inserted_at: i64,
}

impl ImageRecord {
    /// True once the image fetch has completed (real image or placeholder)
    pub fn is_loaded(&self) -> bool {
        self.full_image.is_some() && self.thumbnail.is_some()
    }

    /// Display title, falling back to the URL when the manifest gave no name
    pub fn title(&self) -> &str {
        self.name
            .as_deref()
            .or(self.source_url.as_deref())
            .unwrap_or("(untitled)")
    }

    pub(crate) fn set_images(&mut self, pair: &ImagePair) {
        self.full_image = Some(pair.full.clone());
        self.thumbnail = Some(pair.thumbnail.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_record() -> ImageRecord {
        ImageRecord {
            id: 1,
            name: None,
            description: None,
            source_url: Some("http://example.com/a.jpg".to_string()),
            full_image: None,
            thumbnail: None,
            inserted_at: 0,
        }
    }

    #[test]
    fn test_pending_record_is_not_loaded() {
        let record = pending_record();
        assert!(!record.is_loaded());
        assert_eq!(record.title(), "http://example.com/a.jpg");
    }

    #[test]
    fn test_set_images_marks_loaded() {
        let mut record = pending_record();
        let payload = ImagePayload::new(vec![1u8, 2, 3], 10, 5);
        record.set_images(&ImagePair {
            full: payload.clone(),
            thumbnail: payload,
        });
        assert!(record.is_loaded());
    }

    #[test]
    fn test_payload_clone_shares_bytes() {
        let payload = ImagePayload::new(vec![9u8; 64], 8, 8);
        let copy = payload.clone();
        assert_eq!(payload.bytes().as_ptr(), copy.bytes().as_ptr());
        assert_eq!(format!("{:?}", copy), "ImagePayload { len: 64, width: 8, height: 8 }");
    }
}
