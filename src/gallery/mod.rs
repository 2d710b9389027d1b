/// Gallery coordination module
///
/// This module ties the pipeline together:
/// - Load / delete / refresh state machine (coordinator.rs)
/// - Typed events for the UI collaborator (events.rs)

pub mod coordinator;
pub mod events;

pub use coordinator::{Gallery, GalleryPhase};
pub use events::{EventBus, GalleryEvent};
