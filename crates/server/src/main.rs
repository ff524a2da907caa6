use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gtfs_batch_core::testing::MockJobRunner;
use gtfs_batch_core::{
    load_config, validate_config, BatchStore, CombinationSource, Config, DiscoveryBackend,
    FileCombinationSource, FsCombinationSource, HttpJobRunner, JobRunner, JobRunnerBackend,
    NoDiscovery, SqliteCombinationStore, TickDriver,
};

use gtfs_batch_server::api::create_router;
use gtfs_batch_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("GTFS_BATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Capacity: {} concurrent", config.capacity.max_concurrent);

    // Create SQLite combination store (records and capacity ledger)
    let store: Arc<dyn BatchStore> = Arc::new(
        SqliteCombinationStore::new(&config.database.path, config.capacity.max_concurrent)
            .context("Failed to create combination store")?,
    );
    info!("Combination store initialized");

    let runner = create_job_runner(&config)?;
    let source = create_combination_source(&config)?;

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), store, runner, source));

    // Start the periodic tick driver if enabled
    let driver = if config.driver.enabled {
        let driver = TickDriver::new(
            config.driver.clone(),
            state.scheduler(),
            state.reconciler(),
            config.scheduler.max_to_start,
            config.reconciler.max_to_check,
        );
        driver.start();
        Some(driver)
    } else {
        info!("Tick driver disabled in config, ticks are triggered through the API");
        None
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if let Some(driver) = driver {
        driver.stop();
        info!("Tick driver stopped");
    }

    Ok(())
}

fn create_job_runner(config: &Config) -> Result<Arc<dyn JobRunner>> {
    match config.job_runner.backend {
        JobRunnerBackend::Http => {
            let http_config = config
                .job_runner
                .http
                .clone()
                .ok_or_else(|| anyhow!("HTTP job runner selected but no http config provided"))?;
            info!("Initializing HTTP job runner at {}", http_config.url);
            let runner = HttpJobRunner::new(http_config, config.jobs.clone())
                .context("Failed to create job runner")?;
            Ok(Arc::new(runner))
        }
        JobRunnerBackend::Mock => {
            warn!("Using the in-process mock job runner; no jobs will actually run");
            Ok(Arc::new(MockJobRunner::new()))
        }
    }
}

fn create_combination_source(config: &Config) -> Result<Arc<dyn CombinationSource>> {
    let discovery = &config.discovery;
    match discovery.backend {
        DiscoveryBackend::Filesystem => {
            let root = discovery
                .root
                .clone()
                .ok_or_else(|| anyhow!("Filesystem discovery selected but no root provided"))?;
            info!("Discovering combinations under {:?}", root);
            Ok(Arc::new(FsCombinationSource::new(
                root,
                discovery.required_types.clone(),
            )))
        }
        DiscoveryBackend::File => {
            let path = discovery.combinations_file.clone().ok_or_else(|| {
                anyhow!("File discovery selected but no combinations_file provided")
            })?;
            info!("Reading combinations from {:?}", path);
            Ok(Arc::new(FileCombinationSource::new(path)))
        }
        DiscoveryBackend::None => {
            info!("Discovery not configured, units must be registered explicitly");
            Ok(Arc::new(NoDiscovery))
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
