//! Gallery events backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is owned by the coordinator; the UI side holds receivers
//! from [`EventBus::subscribe`].

use tokio::sync::broadcast;

use crate::state::data::{ImagePayload, ImageRecord, RecordId};

/// Something the UI collaborator should react to
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryEvent {
    /// A network operation was refused because the host is unreachable
    NetworkUnavailable,

    /// A record's thumbnail (real or placeholder) has been stored.
    /// Keyed by record id, which stays valid while the working set shifts.
    ThumbnailReady {
        id: RecordId,
        thumbnail: ImagePayload,
    },

    /// The working set changed shape (e.g. after a delete)
    GalleryChanged { records: Vec<ImageRecord> },
}

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out of [`GalleryEvent`]s.
///
/// When the buffer is full, the oldest un-consumed events are dropped and
/// slow receivers observe `RecvError::Lagged`.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<GalleryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to all current subscribers. With no subscribers the event is dropped.
    pub fn publish(&self, event: GalleryEvent) {
        // SendError only means there are zero receivers
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GalleryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
