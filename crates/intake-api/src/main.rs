//! # intake-api: Binary Entry Point
//!
//! Reads configuration from the environment, wires the backends, and serves
//! until Ctrl-C. Queued side effects are drained before exit.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use intake_api::config::{AppConfig, LogFormat};
use intake_api::db::memory::MemoryRepository;
use intake_api::db::postgres::PgRepository;
use intake_api::db::{init_pool, IntakeRepository};
use intake_api::state::{AppState, Backends};
use intake_api::uploads::LocalFileStorage;
use intake_client::{AddressClient, AddressClientConfig, AddressLookup};
use intake_compliance::HttpPageFetcher;
use intake_state::StepRegistry;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn load_registry(config: &AppConfig) -> anyhow::Result<StepRegistry> {
    match &config.steps_file {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("reading step table {}", path.display()))?;
            let registry = StepRegistry::from_yaml(&source)
                .with_context(|| format!("parsing step table {}", path.display()))?;
            tracing::info!(path = %path.display(), steps = registry.len(), "loaded step table");
            Ok(registry)
        }
        None => Ok(StepRegistry::loan_application()),
    }
}

fn address_lookup(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn AddressLookup>>> {
    let Some(key) = &config.geoapify_api_key else {
        tracing::warn!("GEOAPIFY_API_KEY not set. Address suggestions will return 503.");
        return Ok(None);
    };
    let client = AddressClient::new(AddressClientConfig::new(key.clone()))
        .context("building address client")?;
    Ok(Some(Arc::new(client)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let registry = Arc::new(load_registry(&config)?);

    let repository: Arc<dyn IntakeRepository> =
        match init_pool(config.database_url.as_deref()).await? {
            Some(pool) => Arc::new(PgRepository::new(pool)),
            None => Arc::new(MemoryRepository::new()),
        };

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {}", config.upload_dir.display()))?;

    let backends = Backends {
        repository,
        storage: Arc::new(LocalFileStorage::new(
            &config.upload_dir,
            &config.public_base_url,
        )),
        fetcher: Arc::new(HttpPageFetcher::with_timeout(config.fetch_timeout)?),
        address_lookup: address_lookup(&config)?,
    };

    let port = config.port;
    let state = AppState::new(config, registry, backends);
    let dispatcher = state.dispatcher.clone();
    let app = intake_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("intake API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.drain().await;
    tracing::info!("side effects drained, exiting");
    Ok(())
}
