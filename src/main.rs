use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use hinge_gallery::imaging::is_placeholder;
use hinge_gallery::state::Catalog;
use hinge_gallery::{Gallery, GalleryConfig, GalleryError, GalleryEvent, ImageRecord};

/// Command line front end standing in for the gallery UI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON config file (missing keys use defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Manifest URL
    #[arg(long, global = true)]
    manifest_url: Option<String>,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the gallery and wait for thumbnails (default)
    Load {
        /// Seconds to wait for pending thumbnails
        #[arg(long, default_value_t = 60)]
        wait: u64,
    },
    /// List catalogued images without touching the network
    List,
    /// Delete one image record
    Delete { id: i64 },
    /// Clear the catalog and reload from the network
    Refresh {
        #[arg(long, default_value_t = 60)]
        wait: u64,
    },
}

/// Outcome of waiting on a load or refresh
#[derive(Debug, Clone)]
struct LoadSummary {
    total: usize,
    ready: usize,
    broken: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging first
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::Load { wait: 60 }) {
        Commands::List => list_images(&config),
        Commands::Delete { id } => {
            let gallery = Gallery::open(&config).await?;
            let remaining = gallery.delete(id).await?;
            println!("🗑️  Deleted image {}. {} images remain.", id, remaining.len());
            Ok(())
        }
        Commands::Load { wait } => {
            let gallery = Gallery::open(&config).await?;
            let events = gallery.subscribe();
            let records = report_network(gallery.load_images().await)?;
            let wait = thumbnail_wait(gallery.is_reachable(), wait);
            let summary = wait_for_thumbnails(events, &records, wait).await;
            print_summary(&summary);
            Ok(())
        }
        Commands::Refresh { wait } => {
            let gallery = Gallery::open(&config).await?;
            let events = gallery.subscribe();
            let records = report_network(gallery.refresh().await)?;
            let summary = wait_for_thumbnails(events, &records, Duration::from_secs(wait)).await;
            print_summary(&summary);
            Ok(())
        }
    }
}

/// Config file first, then command line overrides
fn load_config(cli: &Cli) -> Result<GalleryConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => GalleryConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => GalleryConfig::default(),
    };

    if let Some(db) = &cli.db {
        config = config.with_db_path(db);
    }
    if let Some(url) = &cli.manifest_url {
        config = config.with_manifest_url(url);
    }
    Ok(config)
}

fn list_images(config: &GalleryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Catalog::open(&config.db_path)?;
    let records = catalog.fetch_all()?;

    if records.is_empty() {
        println!("No images in catalog at {}", config.db_path.display());
        return Ok(());
    }

    println!("{} images in catalog:", records.len());
    for record in &records {
        let status = match &record.thumbnail {
            None => "pending".to_string(),
            Some(thumb) if is_placeholder(thumb) => "broken".to_string(),
            Some(thumb) => format!("{}x{}", thumb.width(), thumb.height()),
        };
        println!("  [{}] {} ({})", record.id, record.title(), status);
    }
    Ok(())
}

/// Turn an offline refusal into a friendly message; other errors pass through
fn report_network(
    result: Result<Vec<ImageRecord>, GalleryError>,
) -> Result<Vec<ImageRecord>, GalleryError> {
    if let Err(e) = &result {
        if e.is_network_unavailable() {
            eprintln!("⚠️  Network unavailable. Cached images are kept; try again when online.");
        }
    }
    result
}

/// How long to wait for thumbnails; pending downloads only start while online
fn thumbnail_wait(reachable: bool, wait_secs: u64) -> Duration {
    if reachable {
        Duration::from_secs(wait_secs)
    } else {
        Duration::ZERO
    }
}

/// Count ThumbnailReady events until every pending record has one or the wait runs out
async fn wait_for_thumbnails(
    mut events: broadcast::Receiver<GalleryEvent>,
    records: &[ImageRecord],
    wait: Duration,
) -> LoadSummary {
    let mut summary = LoadSummary {
        total: records.len(),
        ready: records.iter().filter(|r| r.is_loaded()).count(),
        broken: records
            .iter()
            .filter(|r| r.thumbnail.as_ref().is_some_and(is_placeholder))
            .count(),
    };

    if wait.is_zero() {
        if summary.ready < summary.total {
            println!("⚠️  Offline: {} thumbnails still pending.", summary.total - summary.ready);
        }
        return summary;
    }

    let deadline = tokio::time::Instant::now() + wait;
    while summary.ready < summary.total {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(GalleryEvent::ThumbnailReady { id, thumbnail })) => {
                summary.ready += 1;
                if is_placeholder(&thumbnail) {
                    summary.broken += 1;
                }
                if summary.ready % 10 == 0 {
                    println!("⏳ {} of {} thumbnails ready...", summary.ready, summary.total);
                }
                tracing::debug!("Thumbnail ready for record {}", id);
            }
            Ok(Ok(_)) => {}
            Ok(Err(RecvError::Lagged(skipped))) => {
                warn!("Missed {} gallery events", skipped);
            }
            Ok(Err(RecvError::Closed)) => break,
            Err(_) => {
                warn!("Gave up waiting for thumbnails");
                break;
            }
        }
    }

    summary
}

fn print_summary(summary: &LoadSummary) {
    println!(
        "✅ {} of {} thumbnails ready ({} broken).",
        summary.ready, summary.total, summary.broken
    );
}
