use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use vexdb_core::{config, DistanceMetric, IndexKind, IndexRegistry, VectorDatabase};
use vexdb_server::api::create_router;
use vexdb_server::api::handlers::AppState;

#[derive(Parser)]
#[command(name = "vexdb-server", about = "Vector database service")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Data directory (key-value store, WAL, snapshots)
    #[arg(short, long, default_value = config::DEFAULT_DATA_DIR)]
    data_dir: String,

    /// Vector dimension for the ANN indices
    #[arg(long, default_value_t = 3)]
    dim: usize,

    /// Maximum capacity of the HNSW index
    #[arg(long, default_value_t = config::HNSW_DEFAULT_CAPACITY)]
    capacity: usize,

    /// Distance metric: "l2" or "ip"
    #[arg(long, default_value = "l2")]
    metric: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("vexdb_server=info".parse().expect("valid directive literal"))
                .add_directive("vexdb_core=info".parse().expect("valid directive literal")),
        )
        .init();

    let args = Args::parse();

    if args.port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }
    if args.dim == 0 || args.dim > config::MAX_DIMENSION {
        eprintln!("Error: dim must be 1-{}", config::MAX_DIMENSION);
        std::process::exit(1);
    }
    let metric = match args.metric.as_str() {
        "l2" => DistanceMetric::L2,
        "ip" => DistanceMetric::InnerProduct,
        other => {
            eprintln!("Error: unknown metric '{other}' (expected 'l2' or 'ip')");
            std::process::exit(1);
        }
    };

    let mut registry = IndexRegistry::new();
    registry.init(IndexKind::Flat, args.dim, None, metric);
    registry.init(IndexKind::Hnsw, args.dim, Some(args.capacity), metric);
    registry.init(IndexKind::Filter, 0, None, metric);

    let data_dir = std::path::PathBuf::from(&args.data_dir);
    let mut db = VectorDatabase::open(&data_dir, registry)?;
    db.reload()?;

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        start_time: Instant::now(),
    };
    let app = create_router(state);

    let addr = format!("127.0.0.1:{}", args.port);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        data_dir = %args.data_dir,
        dim = args.dim,
        "vexdb ready"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully...");
}
