use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use super::events::{EventBus, GalleryEvent};
use crate::config::GalleryConfig;
use crate::error::{CatalogError, FetchError, GalleryError};
use crate::imaging::{placeholder_pair, ImageEngine};
use crate::net::{ConnectivityMonitor, DynTransport, HttpTransport, ManifestFetcher};
use crate::state::{Catalog, ImagePair, ImageRecord, RecordId};

/// Where a gallery session is in its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryPhase {
    Idle,
    LoadingFromCatalog,
    LoadingFromNetwork,
    /// The record list has been handed out; thumbnails may still be arriving
    Ready,
    Failed,
}

/// Everything mutated by the coordinator lives behind one lock, so the
/// catalog and the working set always change together.
struct GalleryState {
    catalog: Catalog,
    /// Ordered working set handed to the UI
    records: Vec<ImageRecord>,
    phase: GalleryPhase,
    /// Records with a download spawned but not yet applied
    in_flight: HashSet<RecordId>,
}

struct Inner {
    state: Mutex<GalleryState>,
    /// Serializes `load_images` and `refresh`; never held by readers
    load_gate: Mutex<()>,
    connectivity: Arc<ConnectivityMonitor>,
    manifest: ManifestFetcher,
    engine: Arc<ImageEngine>,
    events: EventBus,
    /// Bounds concurrent image downloads
    fetch_slots: Arc<Semaphore>,
}

/// Coordinates the catalog, the manifest and the image engine.
///
/// Cheap to clone; clones share the same session. Background work is
/// spawned on the ambient Tokio runtime.
#[derive(Clone)]
pub struct Gallery {
    inner: Arc<Inner>,
}

impl Gallery {
    pub fn new(
        config: &GalleryConfig,
        catalog: Catalog,
        transport: DynTransport,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        let manifest = ManifestFetcher::new(
            config.manifest_url.clone(),
            transport.clone(),
            connectivity.clone(),
        );
        let engine = Arc::new(ImageEngine::new(
            transport,
            config.image_cache_capacity,
            config.thumbnail_max_edge,
        ));

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(GalleryState {
                    catalog,
                    records: Vec::new(),
                    phase: GalleryPhase::Idle,
                    in_flight: HashSet::new(),
                }),
                load_gate: Mutex::new(()),
                connectivity,
                manifest,
                engine,
                events: EventBus::new(config.event_capacity),
                fetch_slots: Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1))),
            }),
        }
    }

    /// Open the on-disk catalog, build the HTTP transport and start
    /// monitoring the reachability host.
    pub async fn open(config: &GalleryConfig) -> Result<Self, GalleryError> {
        let catalog = Catalog::open(&config.db_path)?;
        let transport: DynTransport = Arc::new(HttpTransport::new(&config.user_agent)?);

        let connectivity = Arc::new(
            ConnectivityMonitor::new(&config.reachability_host())
                .with_probe(config.probe_port, config.probe_timeout()),
        );
        connectivity.probe_now().await;
        connectivity.start(config.probe_interval());

        Ok(Self::new(config, catalog, transport, connectivity))
    }

    /// Load the gallery.
    ///
    /// A non-empty catalog is returned as-is with no manifest traffic.
    /// Otherwise the manifest is fetched, one record is inserted per entry
    /// and the pending records are returned right away; thumbnails follow
    /// as `ThumbnailReady` events.
    ///
    /// Readers are not blocked while the manifest is in flight. Concurrent
    /// loads and refreshes run one after another.
    pub async fn load_images(&self) -> Result<Vec<ImageRecord>, GalleryError> {
        let _load = self.inner.load_gate.lock().await;

        {
            let mut state = self.inner.state.lock().await;
            state.phase = GalleryPhase::LoadingFromCatalog;

            let stored = match state.catalog.fetch_all() {
                Ok(records) => records,
                Err(e) => {
                    error!("Failed to read catalog: {}", e);
                    state.phase = GalleryPhase::Failed;
                    return Err(e.into());
                }
            };

            if !stored.is_empty() {
                info!("Loaded {} images from catalog", stored.len());
                state.records = stored.clone();
                state.phase = GalleryPhase::Ready;

                // Records left without images by an interrupted session
                let pending: Vec<ImageRecord> =
                    stored.iter().filter(|r| !r.is_loaded()).cloned().collect();
                if !pending.is_empty() {
                    if self.inner.connectivity.is_reachable() {
                        let started = self.inner.spawn_fetches(&mut state, pending);
                        if started > 0 {
                            info!("Resuming {} unfinished image downloads", started);
                        }
                    } else {
                        debug!("{} images still pending; waiting for network", pending.len());
                    }
                }
                return Ok(stored);
            }

            state.phase = GalleryPhase::LoadingFromNetwork;
        }

        self.inner.load_from_network().await
    }

    /// Remove one record from the catalog and the working set.
    /// Emits `GalleryChanged` with the new working set.
    pub async fn delete(&self, id: RecordId) -> Result<Vec<ImageRecord>, GalleryError> {
        let mut state = self.inner.state.lock().await;

        if !state.catalog.delete_one(id)? {
            return Err(CatalogError::NotFound(id).into());
        }
        if state.phase == GalleryPhase::Idle {
            // Nothing loaded yet: the catalog is the gallery
            state.records = state.catalog.fetch_all()?;
        } else {
            state.records.retain(|r| r.id != id);
        }
        info!("Deleted image record {}", id);

        let records = state.records.clone();
        self.inner.events.publish(GalleryEvent::GalleryChanged {
            records: records.clone(),
        });
        Ok(records)
    }

    /// Clear the catalog and reload from the network.
    ///
    /// While offline this clears nothing: it emits `NetworkUnavailable`
    /// and returns `GalleryError::NetworkUnavailable`.
    pub async fn refresh(&self) -> Result<Vec<ImageRecord>, GalleryError> {
        let _load = self.inner.load_gate.lock().await;

        {
            let mut state = self.inner.state.lock().await;

            if !self.inner.connectivity.is_reachable() {
                warn!("Refresh skipped: network unavailable, keeping cached gallery");
                self.inner.events.publish(GalleryEvent::NetworkUnavailable);
                return Err(GalleryError::NetworkUnavailable);
            }

            if let Err(e) = state.catalog.delete_all() {
                error!("Failed to clear catalog for refresh: {}", e);
                return Err(e.into());
            }
            state.records.clear();
            state.phase = GalleryPhase::LoadingFromNetwork;
        }

        self.inner.load_from_network().await
    }

    /// Snapshot of the working set
    pub async fn records(&self) -> Vec<ImageRecord> {
        self.inner.state.lock().await.records.clone()
    }

    pub async fn record(&self, id: RecordId) -> Option<ImageRecord> {
        let state = self.inner.state.lock().await;
        state.records.iter().find(|r| r.id == id).cloned()
    }

    pub async fn phase(&self) -> GalleryPhase {
        self.inner.state.lock().await.phase
    }

    /// Number of records in the durable catalog
    pub async fn stored_count(&self) -> Result<i64, GalleryError> {
        Ok(self.inner.state.lock().await.catalog.image_count()?)
    }

    pub fn is_reachable(&self) -> bool {
        self.inner.connectivity.is_reachable()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GalleryEvent> {
        self.inner.events.subscribe()
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.inner.connectivity
    }

    pub fn image_engine(&self) -> &Arc<ImageEngine> {
        &self.inner.engine
    }
}

impl Inner {
    /// Fetch the manifest and insert a record per entry.
    ///
    /// The caller holds `load_gate` and has already set the phase to
    /// `LoadingFromNetwork`. The state lock is only taken once the
    /// manifest is in hand.
    async fn load_from_network(self: &Arc<Self>) -> Result<Vec<ImageRecord>, GalleryError> {
        let fetched = self.manifest.fetch().await;
        let mut state = self.state.lock().await;

        let descriptors = match fetched {
            Ok(descriptors) => descriptors,
            Err(FetchError::NoNetwork) => {
                state.phase = GalleryPhase::Failed;
                self.events.publish(GalleryEvent::NetworkUnavailable);
                return Err(GalleryError::NetworkUnavailable);
            }
            Err(e) => {
                state.phase = GalleryPhase::Failed;
                return Err(e.into());
            }
        };

        let mut records: Vec<ImageRecord> = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let record = match state.catalog.insert(descriptor) {
                Ok(record) => record,
                Err(e) => {
                    // Keep what was committed so the working set matches the catalog
                    error!("Failed to store manifest entry: {}", e);
                    state.records = records;
                    state.phase = GalleryPhase::Failed;
                    return Err(e.into());
                }
            };

            // Repeated URLs in the manifest map onto the same record
            if !records.iter().any(|r| r.id == record.id) {
                records.push(record);
            }
        }

        info!("Inserted {} pending images", records.len());
        state.records = records.clone();
        state.phase = GalleryPhase::Ready;

        let pending = records.iter().filter(|r| !r.is_loaded()).cloned().collect();
        self.spawn_fetches(&mut state, pending);

        Ok(records)
    }

    /// Start one download per record not already in flight, bounded by
    /// `fetch_slots`. Returns how many were started.
    ///
    /// Results are funnelled through a channel into a single applier task,
    /// which is the only place completions touch the catalog. In-flight
    /// downloads are never cancelled.
    fn spawn_fetches(
        self: &Arc<Self>,
        state: &mut GalleryState,
        records: Vec<ImageRecord>,
    ) -> usize {
        let records: Vec<ImageRecord> = records
            .into_iter()
            .filter(|r| state.in_flight.insert(r.id))
            .collect();
        if records.is_empty() {
            return 0;
        }
        let started = records.len();

        let (tx, rx) = mpsc::unbounded_channel::<(RecordId, ImagePair)>();

        for record in records {
            let tx = tx.clone();
            let Some(url) = record.source_url else {
                warn!("Image record {} has no URL; using placeholder", record.id);
                let _ = tx.send((record.id, placeholder_pair(self.engine.max_edge())));
                continue;
            };

            let engine = self.engine.clone();
            let slots = self.fetch_slots.clone();
            tokio::spawn(async move {
                let Ok(_permit) = slots.acquire_owned().await else {
                    return;
                };
                let pair = engine.fetch_and_scale(&url).await;
                let _ = tx.send((record.id, pair));
            });
        }
        drop(tx);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx = rx;
            while let Some((id, pair)) = rx.recv().await {
                inner.apply_completion(id, pair).await;
            }
        });

        started
    }

    /// Store a finished download and announce it.
    ///
    /// Record ids come from AUTOINCREMENT and are never reused, so a
    /// completion for a record that was deleted or refreshed away simply
    /// finds nothing and is dropped.
    async fn apply_completion(&self, id: RecordId, pair: ImagePair) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&id);

        let Some(index) = state.records.iter().position(|r| r.id == id) else {
            debug!("Dropping image for record {} no longer in the gallery", id);
            return;
        };

        match state.catalog.update(id, &pair) {
            Ok(()) => {}
            Err(CatalogError::AlreadyLoaded(_)) => {
                debug!("Image record {} already has its images", id);
                return;
            }
            Err(e) => {
                error!("Failed to store images for record {}: {}", id, e);
                return;
            }
        }

        state.records[index].set_images(&pair);
        self.events.publish(GalleryEvent::ThumbnailReady {
            id,
            thumbnail: pair.thumbnail,
        });
    }
}

impl std::fmt::Debug for Gallery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gallery")
            .field("manifest_url", &self.inner.manifest.url())
            .field("connectivity", &self.inner.connectivity)
            .finish()
    }
}
