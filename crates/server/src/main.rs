use clap::Parser;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use vecfs_core::config;
use vecfs_core::Engine;
use vecfs_server::api::create_router;
use vecfs_server::api::handlers::AppState;
use vecfs_server::api::metrics;
use vecfs_server::api::models::InitIndexRequest;

#[derive(Parser)]
#[command(name = "vecfs", about = "HNSW vector index server for the vector filesystem")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Initialize an index with this many dimensions at startup (omit to wait for POST /index)
    #[arg(short, long)]
    dimensions: Option<usize>,

    /// Distance metric for the startup index: euclidean, cosine, dot_product, manhattan
    #[arg(long, default_value = "euclidean")]
    metric: String,

    /// Links per node on upper layers (layer 0 gets twice as many)
    #[arg(long, default_value_t = config::HNSW_DEFAULT_M)]
    m: usize,

    /// Candidate list size during construction
    #[arg(long, default_value_t = config::HNSW_DEFAULT_EF_CONSTRUCTION)]
    ef_construction: usize,

    /// Candidate list size during search
    #[arg(long, default_value_t = config::HNSW_DEFAULT_EF_SEARCH)]
    ef_search: usize,

    /// Maximum number of graph layers
    #[arg(long, default_value_t = config::HNSW_DEFAULT_MAX_LAYERS)]
    max_layers: usize,

    /// Seed for layer assignment (omit for OS entropy)
    #[arg(long)]
    seed: Option<u64>,

    /// Graceful shutdown timeout in seconds
    #[arg(long, default_value_t = config::DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    shutdown_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("vecfs_server=info".parse()?)
                .add_directive("vecfs_core=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }

    let engine = Engine::new();
    if let Some(dimensions) = args.dimensions {
        let request = InitIndexRequest {
            dimensions,
            distance_metric: Some(args.metric.clone()),
            m: Some(args.m),
            ef_construction: Some(args.ef_construction),
            ef_search: Some(args.ef_search),
            max_layers: Some(args.max_layers),
            seed: args.seed,
        };
        let init = match request.to_config() {
            Ok(config) => engine.init_with_config(config).map_err(|e| e.to_string()),
            Err(e) => Err(format!("{:?}", e)),
        };
        if let Err(e) = init {
            eprintln!("Error: cannot initialize index: {}", e);
            std::process::exit(1);
        }
    }

    let prometheus_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let state = AppState {
        engine: engine.clone(),
        prometheus_handle,
        start_time: Instant::now(),
    };
    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", args.port);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        initialized = engine.is_initialized(),
        dimensions = args.dimensions,
        metric = %args.metric,
        "vecfs ready"
    );

    let metrics_engine = engine.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(config::METRICS_REFRESH_SECS));
        loop {
            interval.tick().await;
            metrics::update_index_metrics(&metrics_engine);
        }
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    release_index(engine, args.shutdown_timeout).await;

    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully, draining in-flight requests...");
}

/// Tear down the index once requests have drained, bounded by the shutdown timeout.
async fn release_index(engine: Engine, timeout_secs: u64) {
    if !engine.is_initialized() {
        return;
    }
    tracing::info!("All requests drained, releasing index...");
    let cleanup = tokio::task::spawn_blocking(move || engine.cleanup());
    match tokio::time::timeout(Duration::from_secs(timeout_secs), cleanup).await {
        Ok(Ok(Ok(()))) => tracing::info!("Index released"),
        Ok(Ok(Err(e))) => tracing::warn!("Index cleanup skipped: {}", e),
        Ok(Err(e)) => tracing::error!("Index cleanup task failed: {}", e),
        Err(_) => tracing::error!(
            "Shutdown cleanup timeout ({}s) exceeded, exiting without releasing index",
            timeout_secs
        ),
    }
}
