use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default port probed on the reachability host
pub const DEFAULT_PROBE_PORT: u16 = 443;

/// Reachability of one specific host, with change notifications.
///
/// The monitor is bound to the image-hosting domain rather than general
/// internet access. A hostname that cannot be parsed leaves the monitor
/// permanently unreachable instead of failing construction.
pub struct ConnectivityMonitor {
    hostname: String,
    /// None when the hostname is malformed or the monitor is fixed
    probe_target: Option<String>,
    probe_port: u16,
    probe_timeout: Duration,
    state: watch::Sender<bool>,
    probe_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    /// Create a monitor for `hostname`. Starts out unreachable until a probe succeeds.
    pub fn new(hostname: &str) -> Self {
        let probe_target = match url::Host::parse(hostname) {
            Ok(host) => Some(host.to_string()),
            Err(e) => {
                warn!(
                    "Cannot monitor reachability of {:?} ({}); treating network as unavailable",
                    hostname, e
                );
                None
            }
        };

        let (state, _) = watch::channel(false);
        Self {
            hostname: hostname.to_string(),
            probe_target,
            probe_port: DEFAULT_PROBE_PORT,
            probe_timeout: Duration::from_secs(5),
            state,
            probe_task: Mutex::new(None),
        }
    }

    /// A monitor that never probes and reports `reachable` until told otherwise
    pub fn fixed(reachable: bool) -> Self {
        let (state, _) = watch::channel(reachable);
        Self {
            hostname: String::new(),
            probe_target: None,
            probe_port: DEFAULT_PROBE_PORT,
            probe_timeout: Duration::from_secs(5),
            state,
            probe_task: Mutex::new(None),
        }
    }

    pub fn with_probe(mut self, port: u16, timeout: Duration) -> Self {
        self.probe_port = port;
        self.probe_timeout = timeout;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// False if the hostname could not be parsed
    pub fn is_monitoring(&self) -> bool {
        self.probe_target.is_some()
    }

    pub fn is_reachable(&self) -> bool {
        *self.state.borrow()
    }

    /// Publish a new state. Subscribers only wake on an actual transition.
    pub fn set_reachable(&self, reachable: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });

        if changed {
            info!(
                "Reachability of {} changed: {}",
                self.display_host(),
                if reachable { "reachable" } else { "unreachable" }
            );
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Invoke `callback` with the new state on every transition.
    /// Must be called from within a Tokio runtime.
    pub fn on_change<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(bool) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let reachable = *rx.borrow_and_update();
                callback(reachable);
            }
        })
    }

    /// Resolve the host and attempt a TCP connection, publishing the result
    pub async fn probe_now(&self) -> bool {
        let Some(target) = self.probe_target.as_deref() else {
            return self.is_reachable();
        };

        let reachable = probe_host(target, self.probe_port, self.probe_timeout).await;
        debug!("Probe of {}:{} -> {}", target, self.probe_port, reachable);
        self.set_reachable(reachable);
        reachable
    }

    /// Spawn a periodic probe loop. Does nothing for fixed or malformed monitors.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        if self.probe_target.is_none() {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime; reachability of {} will not be monitored", self.hostname);
                return;
            }
        };

        // The loop holds a weak reference so dropping the monitor ends it
        let monitor: Weak<Self> = Arc::downgrade(self);
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match monitor.upgrade() {
                    Some(monitor) => {
                        monitor.probe_now().await;
                    }
                    None => break,
                }
            }
        });

        let mut slot = self.probe_task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Stop the probe loop, if one is running
    pub fn stop(&self) {
        let mut slot = self.probe_task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = slot.take() {
            task.abort();
            debug!("Stopped reachability probe for {}", self.hostname);
        }
    }

    fn display_host(&self) -> &str {
        if self.hostname.is_empty() {
            "(fixed)"
        } else {
            &self.hostname
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("hostname", &self.hostname)
            .field("reachable", &self.is_reachable())
            .finish()
    }
}

async fn probe_host(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}
