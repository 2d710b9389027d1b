/// Image acquisition module
///
/// This module handles:
/// - Downloading images and caching them in memory (engine.rs)
/// - Scaling thumbnails to a fixed longer edge (thumbnail.rs)
/// - The fallback asset for broken downloads (placeholder.rs)

pub mod engine;
pub mod placeholder;
pub mod thumbnail;

pub use engine::ImageEngine;
pub use placeholder::{is_placeholder, placeholder_pair};
pub use thumbnail::{scale_to_max_edge, scaled_dimensions, THUMBNAIL_MAX_EDGE};
