//! Movie Night Back binary entrypoint wiring REST, SSE and the sync-store
//! layers.

use std::{env, net::SocketAddr};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod catalog;
mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

#[cfg(test)]
mod test_support;

use config::AppConfig;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_config = AppConfig::load();
    let app_state = AppState::new(app_config);

    start_sync_store(app_state.clone());

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the sync-store backend: CouchDB when configured in the environment,
/// otherwise the in-process memory store (single-client, no cross-device
/// sync).
fn start_sync_store(state: state::SharedState) {
    #[cfg(feature = "couch-store")]
    {
        use std::sync::Arc;

        use dao::storage::StorageError;
        use dao::sync_store::SyncStore;
        use dao::sync_store::couchdb::{CouchConfig, CouchSyncStore};

        if let Ok(couch_config) = CouchConfig::from_env() {
            let connect = move || {
                let couch_config = couch_config.clone();
                async move {
                    CouchSyncStore::connect(couch_config)
                        .await
                        .map(|store| Arc::new(store) as Arc<dyn SyncStore>)
                        .map_err(StorageError::from)
                }
            };
            tokio::spawn(services::store_supervisor::run(state, connect));
            return;
        }

        info!("no CouchDB environment configured; falling back to the memory store");
    }

    tokio::spawn(async move {
        use std::sync::Arc;

        use dao::sync_store::memory::MemoryStore;

        state.install_sync_store(Arc::new(MemoryStore::new())).await;
        services::events::broadcast_system_status(&state, false);
        info!("in-process memory store installed");
    });
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
