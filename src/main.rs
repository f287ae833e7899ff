//! raceparty-back binary entrypoint wiring the lobby WebSocket, health and storage layers.

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raceparty_back::{
    config::AppConfig,
    dao::lobby_store::MemoryStore,
    routes,
    state::{AppState, SharedState},
};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);
    start_storage(&app_state);

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

/// Use MongoDB when `MONGO_URI` is set, the in-process store otherwise.
fn start_storage(state: &SharedState) {
    if start_mongo(state) {
        return;
    }

    info!("no database configured; using in-memory lobby store");
    let store = MemoryStore::new(state.config().party_ttl);
    let installed = state.clone();
    let purged = store.clone();
    tokio::spawn(async move {
        installed.install_store(Arc::new(store)).await;
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            purged.purge_expired();
        }
    });
}

/// Spawn the storage supervisor over MongoDB. Returns `false` when `MONGO_URI` is not set.
#[cfg(feature = "mongo-store")]
fn start_mongo(state: &SharedState) -> bool {
    use raceparty_back::{
        dao::{
            lobby_store::{
                LobbyStore,
                mongodb::{MongoConfig, MongoLobbyStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    if !env::var("MONGO_URI").is_ok_and(|uri| !uri.is_empty()) {
        return false;
    }

    let party_ttl = state.config().party_ttl;
    info!("MONGO_URI set; using MongoDB lobby store");
    tokio::spawn(storage_supervisor::run(state.clone(), move || async move {
        let config = MongoConfig::from_env(party_ttl).await?;
        let store = MongoLobbyStore::connect(config).await?;
        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn LobbyStore>)
    }));
    true
}

#[cfg(not(feature = "mongo-store"))]
fn start_mongo(_state: &SharedState) -> bool {
    false
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
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
