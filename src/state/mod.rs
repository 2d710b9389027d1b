/// State management module
///
/// This module handles the durable side of the gallery:
/// - SQLite catalog of image records (catalog.rs)
/// - Shared data structures (data.rs)

pub mod catalog;
pub mod data;

pub use catalog::Catalog;
pub use data::{ImageDescriptor, ImagePair, ImagePayload, ImageRecord, RecordId};
