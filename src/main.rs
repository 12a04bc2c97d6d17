//! stockroom server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints and the
//! stock update hub.

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use tokio::sync::oneshot;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use stockroom::api;
use stockroom::app_state::AppState;
use stockroom::config::AppConfig;
use stockroom::persistence::{ItemStore, PostgresItemStore};
use stockroom::ws::Hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    init_tracing(&config);
    tracing::info!(addr = %config.listen_addr, "starting stockroom");

    // Storage
    let store = open_store(&config).await?;
    tracing::info!(backend = store.backend(), "item store ready");

    // Stock update hub
    let (hub, hub_handle) = Hub::new(config.hub_config());
    let (hub_stop_tx, hub_stop_rx) = oneshot::channel::<()>();
    let hub_task = tokio::spawn(hub.run(async move {
        let _ = hub_stop_rx.await;
    }));

    // Build application state
    let app_state = AppState::new(store, hub_handle, config.connection_config());

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Closing the hub closes every subscriber buffer; writers send a close
    // frame on their way out.
    let _ = hub_stop_tx.send(());
    match tokio::time::timeout(config.shutdown_timeout(), hub_task).await {
        Ok(Ok(())) => tracing::info!("shutdown complete"),
        Ok(Err(err)) => tracing::error!(%err, "hub task failed"),
        Err(_) => tracing::warn!("hub did not stop within the shutdown timeout"),
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<ItemStore> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, items are kept in memory");
        return Ok(ItemStore::memory());
    }

    let store = PostgresItemStore::connect(config)
        .await
        .context("connecting to PostgreSQL")?;
    if config.run_migrations {
        store.migrate().await.context("running migrations")?;
        tracing::info!("database migrations applied");
    }
    Ok(ItemStore::Postgres(store))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let mut origins = vec![
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://localhost:5173"),
    ];
    match HeaderValue::from_str(&config.frontend_url) {
        Ok(origin) if !origins.contains(&origin) => origins.push(origin),
        Ok(_) => {}
        Err(_) => tracing::warn!(url = %config.frontend_url, "ignoring invalid FRONTEND_URL"),
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
