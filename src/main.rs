//! Idleforge backend binary entrypoint wiring REST, WebSocket, cache, and
//! propagation-stream layers.

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idleforge_back::{
    cache::{
        CacheManager, CachePort,
        memory::MemoryCache,
        pending::{MemoryPendingLog, PendingWriteLog, ValkeyPendingLog},
        valkey::ValkeyCache,
    },
    config::AppConfig,
    dao::save_store::{SaveStore, memory::MemorySaveStore},
    domain::{Characteristics, Currency, GameMetadata, Stage},
    routes,
    services::{
        flush::FlushService, game_save_service::GameSaveService, ownership::OwnershipService,
        recovery, save_data::SaveDataService,
    },
    state::{AppState, SharedState},
    stream::{
        EventDispatcher, EventPublisher, EventSource, consumer,
        memory::MemoryStream,
        valkey::{ValkeyEventPublisher, ValkeyEventSource},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();

    let store: Arc<dyn SaveStore> = Arc::new(MemorySaveStore::new());

    let (caches, pending, publisher, source) = match &config.valkey_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("parsing valkey url")?;
            let conn = client
                .get_connection_manager()
                .await
                .context("connecting to valkey")?;
            let ttl = config.cache_ttl_seconds;
            let caches = Caches {
                characteristics: Arc::new(ValkeyCache::<Characteristics>::new(
                    conn.clone(),
                    "characteristics:",
                    ttl,
                )),
                currency: Arc::new(ValkeyCache::<Currency>::new(conn.clone(), "currency:", ttl)),
                stage: Arc::new(ValkeyCache::<Stage>::new(conn.clone(), "stage:", ttl)),
                metadata: Arc::new(ValkeyCache::<GameMetadata>::new(
                    conn.clone(),
                    "metadata:",
                    ttl,
                )),
            };
            let pending: Arc<dyn PendingWriteLog> = Arc::new(ValkeyPendingLog::new(conn.clone()));
            let publisher: Arc<dyn EventPublisher> = Arc::new(ValkeyEventPublisher::new(
                conn.clone(),
                config.stream_key.clone(),
            ));
            let source: Arc<dyn EventSource> = Arc::new(
                ValkeyEventSource::new(
                    conn,
                    config.stream_key.clone(),
                    config.consumer_group.clone(),
                    config.consumer_name.clone(),
                )
                .await
                .context("creating stream consumer group")?,
            );
            (caches, pending, publisher, source)
        }
        None => {
            warn!("no valkey url configured; running on in-memory backends");
            let caches = Caches {
                characteristics: Arc::new(MemoryCache::<Characteristics>::new(
                    config.cache_ttl_seconds,
                )),
                currency: Arc::new(MemoryCache::<Currency>::new(config.cache_ttl_seconds)),
                stage: Arc::new(MemoryCache::<Stage>::new(config.cache_ttl_seconds)),
                metadata: Arc::new(MemoryCache::<GameMetadata>::new(config.cache_ttl_seconds)),
            };
            let pending: Arc<dyn PendingWriteLog> = Arc::new(MemoryPendingLog::new());
            let stream = Arc::new(MemoryStream::new(256));
            let source: Arc<dyn EventSource> = Arc::new(stream.source());
            let publisher: Arc<dyn EventPublisher> = stream;
            (caches, pending, publisher, source)
        }
    };

    let metadata_cache = caches.metadata.clone();
    let manager = Arc::new(CacheManager::new(
        caches.characteristics.clone(),
        caches.currency.clone(),
        caches.stage.clone(),
        caches.metadata.clone(),
        config.cache_enabled,
    ));

    let characteristics = Arc::new(SaveDataService::new(
        store.clone(),
        caches.characteristics.clone(),
        manager.clone(),
        publisher.clone(),
        pending.clone(),
    ));
    let currency = Arc::new(SaveDataService::new(
        store.clone(),
        caches.currency.clone(),
        manager.clone(),
        publisher.clone(),
        pending.clone(),
    ));
    let stage = Arc::new(SaveDataService::new(
        store.clone(),
        caches.stage.clone(),
        manager.clone(),
        publisher.clone(),
        pending.clone(),
    ));
    let ownership = Arc::new(OwnershipService::new(
        store.clone(),
        caches.metadata.clone(),
        manager.clone(),
    ));
    let flush = Arc::new(FlushService::new(
        store.clone(),
        caches.characteristics,
        caches.currency,
        caches.stage,
        pending,
    ));
    let game_saves = Arc::new(GameSaveService::new(
        store.clone(),
        characteristics.clone(),
        currency.clone(),
        stage.clone(),
        ownership.clone(),
        caches.metadata,
        manager.clone(),
        flush.clone(),
        publisher,
    ));

    // Replay writes a previous instance left unflushed before taking traffic.
    recovery::run(&flush).await;

    let dispatcher = Arc::new(EventDispatcher::new(
        characteristics.clone(),
        currency.clone(),
        stage.clone(),
        metadata_cache,
    ));
    tokio::spawn(consumer::run(source, dispatcher));
    tokio::spawn(run_flush_scheduler(
        flush.clone(),
        config.flush_interval_seconds,
    ));

    let app_state = AppState::new(
        config,
        store,
        manager,
        characteristics,
        currency,
        stage,
        ownership,
        game_saves,
        flush.clone(),
    );
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

    // Last chance to persist cached writes before the process exits.
    let flushed = flush.flush_all().await;
    info!(flushed, "final flush completed");

    Ok(())
}

/// Cache ports for the four cached record types, one backend flavor at a time.
struct Caches {
    characteristics: Arc<dyn CachePort<Characteristics>>,
    currency: Arc<dyn CachePort<Currency>>,
    stage: Arc<dyn CachePort<Stage>>,
    metadata: Arc<dyn CachePort<GameMetadata>>,
}

/// Periodically persist pending cached writes so a crash loses at most one
/// interval of them.
async fn run_flush_scheduler(flush: Arc<FlushService>, interval_seconds: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    interval.tick().await;
    loop {
        interval.tick().await;
        let flushed = flush.flush_all().await;
        if flushed > 0 {
            info!(flushed, "scheduled flush persisted pending writes");
        }
    }
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
