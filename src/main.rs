use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use item_search_proxy::web::{self, AppState};
use item_search_proxy::{
    init_tracing, Config, HttpTransport, MemoryStore, ResultStore, SessionStore, SqliteStore,
    StorageBackend, UpstreamClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv::dotenv() {
        // A missing .env file is normal outside development.
        if !e.not_found() {
            eprintln!("Failed to read .env: {e}");
        }
    }
    init_tracing();

    let config = Config::load().context("invalid configuration")?;
    info!("Loaded configuration: {config:?}");

    let store: Arc<dyn ResultStore> = match &config.storage {
        StorageBackend::Memory => {
            warn!("Using in-memory result store; results are not persisted");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Sqlite(url) => Arc::new(
            SqliteStore::connect(url)
                .await
                .with_context(|| format!("failed to open result store {url}"))?,
        ),
    };

    let transport = HttpTransport::new(config.upstream_url.clone(), config.upstream_api_key)
        .context("failed to build upstream client")?;

    let upstream = UpstreamClient::new(Arc::new(transport), store)
        .with_retry(config.retry)
        .with_limit(config.result_limit);

    let state = AppState::new(upstream)
        .with_sessions(SessionStore::new(config.session_capacity))
        .with_limits(config.default_limits.clone(), config.search_limits.clone())
        .with_max_query_len(config.max_query_len);

    let app = web::router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Server running on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {e}");
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
