use anyhow::{Context, Result};
use saree_catalog::config::Config;
use saree_catalog::flash::signing_key;
use saree_catalog::routes::{start_api_server, AppState};
use saree_catalog::{CatalogService, ImageFolder, ItemStore, QrDecoder};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting Saree Catalog Service"
    );

    if config.uses_default_secret() {
        warn!("api.secret_key is the built-in default; set CATALOG__API__SECRET_KEY");
    }

    if config.service.metrics_enabled {
        init_metrics(config.service.metrics_port)?;
    }

    // An unusable upload root is fatal here rather than per request
    let images = Arc::new(
        ImageFolder::open(&config.storage.upload_root)
            .await
            .context("Failed to prepare upload root")?,
    );

    let items = Arc::new(
        ItemStore::new(&config.database)
            .await
            .context("Failed to initialize item store")?,
    );

    if config.database.run_migrations {
        items
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    let item_count = items.count().await.context("Failed to count items")?;
    info!(items = item_count, "Item store ready");

    let state = AppState {
        catalog: Arc::new(CatalogService::new(items.clone(), images.clone())),
        items,
        qr_decoder: QrDecoder::new(config.api.max_image_pixels),
        upload_root: images.root().to_path_buf(),
        cookie_key: signing_key(&config.api.secret_key),
    };

    start_api_server(state, &config.api, shutdown_signal()).await?;

    info!("Saree catalog stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Shutting down catalog service");
}
