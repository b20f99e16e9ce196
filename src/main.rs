use clap::Parser;
use facereg_api::RestApi;
use facereg_registry::{RegistryConfig, RegistryService, RemoteEmbedder};
use facereg_storage::RecordStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// A face identity registry: register faces with contact details,
/// recognize them later by nearest-neighbor search
#[derive(Parser, Debug)]
#[command(name = "facereg")]
#[command(about = "A small face identity registry", long_about = None)]
struct Args {
    /// Directory holding users.json, embeddings.json and registered_faces/
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// HTTP API port
    #[arg(long, default_value_t = 8000)]
    http_port: u16,

    /// Distance below which the nearest face counts as a match
    #[arg(long, default_value_t = facereg_core::DEFAULT_THRESHOLD)]
    threshold: f32,

    /// Embedding extraction service endpoint
    #[arg(long, default_value = "http://127.0.0.1:5005/represent")]
    embedder_url: String,

    /// Timeout for one extraction request, in seconds
    #[arg(long, default_value_t = 30)]
    embedder_timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting facereg v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);
    info!("HTTP API port: {}", args.http_port);
    info!("Match threshold: {}", args.threshold);
    info!("Embedder: {}", args.embedder_url);

    let store = Arc::new(RecordStore::open(&args.data_dir)?);
    info!("Storage initialized: {} records", store.len());

    // Built outside the async runtime; the blocking client owns its own.
    let embedder = Arc::new(RemoteEmbedder::new(
        args.embedder_url,
        Duration::from_secs(args.embedder_timeout_secs),
    )?);

    let config = RegistryConfig {
        threshold: args.threshold,
    };
    let service = Arc::new(RegistryService::new(store, embedder, config));

    let http_port = args.http_port;
    info!("HTTP API: http://localhost:{}/", http_port);
    actix_web::rt::System::new().block_on(RestApi::start(service, http_port))?;

    info!("Shutting down...");
    Ok(())
}
