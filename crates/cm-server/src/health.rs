//! Health checks
//!
//! The server keeps serving cached contacts while Postgres is down, so a
//! lost database only degrades the report. The local cache tier holding
//! the pending-write queue is the one component whose failure makes the
//! instance unhealthy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use cm_db::Database;
use cm_notifications::ContactFeed;
use cm_services::PendingQueue;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }

    fn worst(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unhealthy, _) | (_, Self::Unhealthy) => Self::Unhealthy,
            (Self::Degraded, _) | (_, Self::Degraded) => Self::Degraded,
            _ => Self::Healthy,
        }
    }
}

/// Individual component health
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    fn new(name: &str, status: HealthStatus, message: impl Into<String>, started: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: Some(message.into()),
            response_time_ms: started.elapsed().as_millis() as u64,
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Overall health report
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    pub fn http_status(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Health checker configuration
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Timeout for the database ping
    pub check_timeout: Duration,
    /// Cache duration for health results
    pub cache_duration: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_timeout: Duration::from_secs(5),
            cache_duration: Duration::from_secs(10),
        }
    }
}

struct CachedHealth {
    report: HealthReport,
    cached_at: Instant,
}

/// Health checker service
pub struct HealthChecker {
    config: HealthConfig,
    start_time: Instant,
    cache: RwLock<Option<CachedHealth>>,
    database: Option<Database>,
    feed: Arc<ContactFeed>,
    pending: Arc<PendingQueue>,
}

impl HealthChecker {
    pub fn new(config: HealthConfig, feed: Arc<ContactFeed>, pending: Arc<PendingQueue>) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            cache: RwLock::new(None),
            database: None,
            feed,
            pending,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    /// Get cached health or perform checks
    pub async fn check(&self) -> HealthReport {
        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.cached_at.elapsed() < self.config.cache_duration {
                    debug!("Returning cached health report");
                    return cached.report.clone();
                }
            }
        }

        let report = self.perform_checks().await;

        {
            let mut cache = self.cache.write().await;
            *cache = Some(CachedHealth {
                report: report.clone(),
                cached_at: Instant::now(),
            });
        }

        report
    }

    async fn perform_checks(&self) -> HealthReport {
        let components = vec![
            self.check_database().await,
            self.check_feed(),
            self.check_pending().await,
        ];
        let status = components
            .iter()
            .fold(HealthStatus::Healthy, |acc, c| acc.worst(c.status));

        if status != HealthStatus::Healthy {
            warn!(?status, "Health check not healthy");
        }

        HealthReport {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components,
            timestamp: chrono::Utc::now(),
        }
    }

    async fn check_database(&self) -> ComponentHealth {
        let start = Instant::now();

        let Some(database) = &self.database else {
            return ComponentHealth::new(
                "database",
                HealthStatus::Degraded,
                "Not connected; serving in-memory stores",
                start,
            );
        };

        let stats = database.stats();
        let details = serde_json::json!({
            "type": "postgresql",
            "pool_size": stats.size,
            "idle_connections": stats.idle,
        });

        let (status, message) =
            match tokio::time::timeout(self.config.check_timeout, database.ping()).await {
                Ok(Ok(())) => (HealthStatus::Healthy, "Connected".to_string()),
                Ok(Err(e)) => (HealthStatus::Degraded, format!("Unreachable: {}", e)),
                Err(_) => (HealthStatus::Degraded, "Ping timed out".to_string()),
            };

        ComponentHealth::new("database", status, message, start).with_details(details)
    }

    fn check_feed(&self) -> ComponentHealth {
        let start = Instant::now();
        let snapshot = self.feed.snapshot();

        let (status, message) = if snapshot.generation == 0 {
            (HealthStatus::Degraded, "No refresh committed yet".to_string())
        } else if snapshot.stale {
            (
                HealthStatus::Degraded,
                snapshot
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "Last refresh failed".to_string()),
            )
        } else {
            (HealthStatus::Healthy, "Up to date".to_string())
        };

        ComponentHealth::new("contact_feed", status, message, start).with_details(serde_json::json!({
            "generation": snapshot.generation,
            "refreshed_at": snapshot.refreshed_at,
            "trigger": snapshot.trigger,
            "contacts": snapshot.contacts.len(),
        }))
    }

    async fn check_pending(&self) -> ComponentHealth {
        let start = Instant::now();

        match self.pending.len().await {
            Ok(0) => ComponentHealth::new("pending_sync", HealthStatus::Healthy, "Queue empty", start),
            Ok(queued) => ComponentHealth::new(
                "pending_sync",
                HealthStatus::Degraded,
                format!("{} write(s) waiting for the database", queued),
                start,
            )
            .with_details(serde_json::json!({ "queued": queued })),
            Err(e) => ComponentHealth::new(
                "pending_sync",
                HealthStatus::Unhealthy,
                format!("Local cache unreadable: {}", e),
                start,
            ),
        }
    }
}

/// State of the health routes
pub struct HealthState {
    pub health: Arc<HealthChecker>,
}

/// Simple liveness check
pub async fn liveness() -> &'static str {
    "OK"
}

/// Readiness check
pub async fn readiness(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    let status = report.http_status();
    (status, Json(report))
}

/// Full health check
pub async fn health(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    let status = report.http_status();
    (status, Json(report))
}
