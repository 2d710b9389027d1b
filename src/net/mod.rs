/// Network module
///
/// This module handles:
/// - Host-bound reachability monitoring
/// - The HTTP transport seam
/// - Fetching and parsing the image manifest

pub mod connectivity;
pub mod manifest;
pub mod transport;

pub use connectivity::ConnectivityMonitor;
pub use manifest::{parse_manifest, ManifestFetcher};
pub use transport::{DynTransport, HttpResponse, HttpTransport, Transport};
