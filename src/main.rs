use clap::Parser;
use iou::application::{RecordStore, Services};
use iou::config::Config;
use iou::infrastructure::identity::InMemoryIdentityProvider;
use iou::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use iou::infrastructure::rocksdb::RocksDBStore;
use iou::interfaces::{http, seed};
use iou::logging::init_logging;
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(&config.log_level, config.log_format);

    match config.db_path.clone() {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            let store = RocksDBStore::open(&db_path).into_diagnostic()?;
            tracing::info!(path = %db_path.display(), "using RocksDB storage");
            serve(config, store).await
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            serve(config, InMemoryStore::new()).await
        }
        None => serve(config, InMemoryStore::new()).await,
    }
}

async fn serve<S>(config: Config, store: S) -> Result<()>
where
    S: RecordStore + Clone + 'static,
{
    let identity = InMemoryIdentityProvider::new();
    if let Some(path) = &config.seed {
        seed::load_seed_file(path, &identity, &store)
            .await
            .into_diagnostic()?;
    }

    let services = Services::new(Arc::new(identity), store);
    let router = http::create_router(services);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .into_diagnostic()?;
    tracing::info!(addr = %config.listen, "HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
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
    tracing::info!("shutdown signal received");
}
