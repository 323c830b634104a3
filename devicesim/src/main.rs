use axum::{routing::get, Router};
use chrono::Utc;
use devicesim::config::{Config, StoreBackend};
use devicesim::kv::memory::MemoryStore;
use devicesim::kv::postgres::PgStore;
use devicesim::kv::KvStore;
use devicesim::service::DeviceService;
use devicesim::{fleet, metrics, rest};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting device simulator");
    info!("HTTP server: {}", config.http_addr);
    info!("Store backend: {:?}", config.store_backend);

    // Initialize metrics
    metrics::init_metrics();

    let kv: Arc<dyn KvStore> = match config.store_backend {
        StoreBackend::Postgres => {
            info!("Database: {}", config.redacted_database_url());
            match PgStore::connect(&config.database_url, config.db_max_connections, config.store_timeout()).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!("Failed to connect to database: {}", e);
                    std::process::exit(1);
                }
            }
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    let service = DeviceService::new(kv, config.store_timeout(), config.retry_policy());

    // The in-memory backend starts empty, so it gets a demo fleet
    if config.store_backend == StoreBackend::Memory {
        let devices = fleet::demo_fleet(config.demo_devices, Utc::now());
        if let Err(e) = fleet::seed(service.devices(), service.history(), &devices, false).await {
            error!("Failed to seed demo fleet: {}", e);
            std::process::exit(1);
        }
    }

    // Build HTTP app with REST API and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(service));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", config.http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", config.http_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("HTTP server error: {}", e);
    }

    info!("Shutting down");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
