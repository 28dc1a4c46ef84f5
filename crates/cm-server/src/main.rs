//! Contact Hub Server
//!
//! Wires the stores, services and background sync tasks, then serves the
//! JSON API and health checks.

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cm_api::{AppState, Stores};
use cm_auth::MemorySessionStore;
use cm_core::config::AppConfig;
use cm_db::{
    ChangelogRepository, ContactRepository, Database, MemoryDatabase, PgRpcClient,
    PreferenceRepository, UserRepository,
};
use cm_notifications::{ChangeListener, Poller};
use cm_services::{Cache, FileCache, MemoryCache, TieredCache};

mod health;

use health::{HealthChecker, HealthConfig, HealthState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        warn!("Failed to load config from env: {}, using defaults", e);
        AppConfig::default()
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        title = %config.instance.app_title,
        "Starting Contact Hub"
    );

    let db = connect_database(&config).await;
    let stores = match &db {
        Some(db) => postgres_stores(db),
        None => {
            warn!("Running on in-memory stores; data will not survive a restart");
            Stores::memory(Arc::new(MemoryDatabase::new()))
        }
    };

    let cache = tiered_cache(&config);
    let state = AppState::new(&config, stores, cache);

    // Replay writes queued while the database was unreachable
    match state.sync.flush().await {
        Ok(report) if report.remaining > 0 => {
            warn!(remaining = report.remaining, "Pending writes still queued after startup sync")
        }
        Ok(report) => info!(replayed = report.replayed, "Startup sync finished"),
        Err(e) => error!(error = %e, "Startup sync failed"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    state.refresh_feed("startup").await;
    let tasks = spawn_background_tasks(&config, &state, db.as_ref(), shutdown_rx);

    let mut health_checker = HealthChecker::new(
        HealthConfig::default(),
        state.feed.clone(),
        state.contacts.pending().clone(),
    );
    if let Some(ref db) = db {
        health_checker = health_checker.with_database(db.clone());
    }
    let health_state = Arc::new(HealthState {
        health: Arc::new(health_checker),
    });

    let app = build_router(state, health_state);

    let addr = config.server_addr();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping background tasks");
    shutdown_tx.send_replace(true);
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Background task ended abnormally");
        }
    }
    if let Some(db) = db {
        db.close().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,cm_server=debug,cm_api=debug,tower_http=debug".into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Connect and migrate; `None` when Postgres is unreachable
async fn connect_database(config: &AppConfig) -> Option<Database> {
    let db = match Database::connect(&config.database).await {
        Ok(db) => {
            info!("Connected to database");
            db
        }
        Err(e) => {
            warn!("Failed to connect to database: {}. Running without database.", e);
            return None;
        }
    };

    if config.database.run_migrations {
        if let Err(e) = db.migrate().await {
            error!(error = %e, "Migrations failed");
        }
    }
    Some(db)
}

fn postgres_stores(db: &Database) -> Stores {
    let pool = db.pool().clone();
    Stores {
        users: Arc::new(UserRepository::new(pool.clone())),
        contacts: Arc::new(ContactRepository::new(pool.clone())),
        preferences: Arc::new(PreferenceRepository::new(pool.clone())),
        changelog: Arc::new(ChangelogRepository::new(pool.clone())),
        rpc: Arc::new(PgRpcClient::new(pool)),
        sessions: Arc::new(MemorySessionStore::new()),
    }
}

/// Session tier in memory, local tier on disk
fn tiered_cache(config: &AppConfig) -> TieredCache {
    let ttl = i64::try_from(config.cache.ttl_seconds).ok();
    info!(path = %config.cache.local_path, ttl_seconds = ?ttl, "Local cache tier");
    TieredCache::new(
        Cache::new(Arc::new(MemoryCache::new()), ttl),
        Cache::new(Arc::new(FileCache::new(&config.cache.local_path)), ttl),
    )
}

/// Poller, and the NOTIFY listener when a pool is available
fn spawn_background_tasks(
    config: &AppConfig,
    state: &AppState,
    db: Option<&Database>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    let interval = Duration::from_secs(config.sync.poll_interval_seconds);
    if let Some(handle) =
        Poller::new(state.feed.clone(), state.feed_source.clone(), interval).spawn(shutdown.clone())
    {
        tasks.push(handle);
    }

    match db {
        Some(db) if config.sync.listen_enabled => {
            let listener = ChangeListener::new(
                db.pool().clone(),
                config.sync.listen_channel.clone(),
                state.feed.clone(),
                state.feed_source.clone(),
            );
            tasks.push(listener.spawn(shutdown));
        }
        Some(_) => info!("Change notifications disabled"),
        None => info!("No database pool, change notifications unavailable"),
    }

    tasks
}

/// Build the application router
fn build_router(state: AppState, health: Arc<HealthState>) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(health);

    Router::new()
        .merge(health_routes)
        .merge(cm_api::router().with_state(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
