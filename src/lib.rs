//! Image acquisition and caching pipeline for a remote photo gallery.
//!
//! The gallery prefers its local SQLite catalog. When the catalog is empty
//! it fetches a JSON manifest, inserts a pending record per image, and
//! downloads and scales each image in the background, announcing every
//! finished thumbnail through [`GalleryEvent::ThumbnailReady`].
//!
//! ```no_run
//! use hinge_gallery::{Gallery, GalleryConfig, GalleryEvent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gallery = Gallery::open(&GalleryConfig::default()).await?;
//! let mut events = gallery.subscribe();
//!
//! let records = gallery.load_images().await?;
//! println!("{} images", records.len());
//!
//! while let Ok(event) = events.recv().await {
//!     if let GalleryEvent::ThumbnailReady { id, thumbnail } = event {
//!         println!("record {id}: {}x{}", thumbnail.width(), thumbnail.height());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gallery;
pub mod imaging;
pub mod net;
pub mod state;

pub use config::GalleryConfig;
pub use error::{CatalogError, FetchError, GalleryError};
pub use gallery::{Gallery, GalleryEvent, GalleryPhase};
pub use state::{ImageDescriptor, ImagePair, ImagePayload, ImageRecord, RecordId};
