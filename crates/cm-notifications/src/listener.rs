//! Push-based change subscription
//!
//! Listens on a Postgres NOTIFY channel; the contacts trigger publishes
//! `{"operation": "...", "id": ...}` for every write. Each notification
//! refreshes the shared feed.

use std::sync::Arc;
use std::time::Duration;

use cm_core::traits::Id;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::feed::{ContactFeed, FeedSource};

/// Payload of a contact change notification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeNotification {
    /// INSERT, UPDATE or DELETE
    pub operation: String,
    #[serde(default)]
    pub id: Option<Id>,
}

impl ChangeNotification {
    pub fn parse(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

/// Subscribes to contact changes and refreshes the feed on each one
pub struct ChangeListener {
    pool: PgPool,
    channel: String,
    feed: Arc<ContactFeed>,
    source: Arc<dyn FeedSource>,
}

impl ChangeListener {
    pub fn new(
        pool: PgPool,
        channel: impl Into<String>,
        feed: Arc<ContactFeed>,
        source: Arc<dyn FeedSource>,
    ) -> Self {
        Self {
            pool,
            channel: channel.into(),
            feed,
            source,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Listen until shutdown, reconnecting after errors
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.listen(&mut shutdown).await {
                Ok(()) => break,
                Err(e) => {
                    error!(error = %e, channel = %self.channel, "Change listener error, reconnecting");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        info!(channel = %self.channel, "Change listener stopped");
    }

    /// One connection's worth of notifications; returns Ok on shutdown
    async fn listen(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.channel).await?;
        info!(channel = %self.channel, "Listening for contact changes");

        loop {
            tokio::select! {
                notification = listener.recv() => {
                    let notification = notification?;
                    match ChangeNotification::parse(notification.payload()) {
                        Some(change) => {
                            debug!(operation = %change.operation, id = ?change.id, "Contact change received")
                        }
                        None => warn!(payload = notification.payload(), "Unrecognised change payload"),
                    }
                    self.feed.refresh(self.source.as_ref(), "notify").await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }
}
