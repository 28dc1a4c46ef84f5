//! Shared contact feed
//!
//! A single in-memory copy of the contact list that the background poller
//! and the change listener both refresh. Every refresh takes a ticket before
//! it starts fetching; a result is committed only when no fetch that started
//! later has already been committed, so the newest read always wins no matter
//! which trigger produced it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cm_db::{ContactStore, RepositoryError};
use cm_models::Contact;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Feed errors
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("Contact source unavailable: {0}")]
    Unavailable(String),

    #[error("Contact source failed: {0}")]
    Source(String),
}

impl From<RepositoryError> for FeedError {
    fn from(err: RepositoryError) -> Self {
        if err.is_unavailable() {
            FeedError::Unavailable(err.to_string())
        } else {
            FeedError::Source(err.to_string())
        }
    }
}

/// Where the feed reads contacts from
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Contact>, FeedError>;
}

/// Reads the full list straight from a contact store
pub struct StoreFeedSource {
    store: Arc<dyn ContactStore>,
}

impl StoreFeedSource {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FeedSource for StoreFeedSource {
    async fn fetch(&self) -> Result<Vec<Contact>, FeedError> {
        Ok(self.store.list().await?)
    }
}

/// Point-in-time view of the feed
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub contacts: Vec<Contact>,
    /// Incremented on every committed refresh; 0 until the first one
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    /// What triggered the last committed refresh ("poll", "notify", "sync")
    pub trigger: Option<String>,
    /// The last refresh failed; `contacts` is from an earlier one
    pub stale: bool,
    pub last_error: Option<String>,
}

/// Result of a refresh
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Updated { generation: u64, count: usize },
    /// A fetch that started later was committed first
    Superseded,
    Failed(FeedError),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

struct FeedState {
    snapshot: FeedSnapshot,
    applied_ticket: u64,
}

/// Contact list shared between the API and the background tasks
pub struct ContactFeed {
    state: RwLock<FeedState>,
    next_ticket: AtomicU64,
    generation_tx: watch::Sender<u64>,
}

impl Default for ContactFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactFeed {
    pub fn new() -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            state: RwLock::new(FeedState {
                snapshot: FeedSnapshot::default(),
                applied_ticket: 0,
            }),
            next_ticket: AtomicU64::new(0),
            generation_tx,
        }
    }

    /// Fetch from `source` and commit the result unless a newer fetch beat it
    pub async fn refresh(&self, source: &dyn FeedSource, trigger: &str) -> RefreshOutcome {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let result = source.fetch().await;

        let mut state = self.state.write();
        if ticket < state.applied_ticket {
            debug!(ticket, applied = state.applied_ticket, trigger, "Discarding superseded feed refresh");
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(contacts) => {
                let count = contacts.len();
                state.applied_ticket = ticket;
                let snapshot = &mut state.snapshot;
                snapshot.contacts = contacts;
                snapshot.generation += 1;
                snapshot.refreshed_at = Some(Utc::now());
                snapshot.trigger = Some(trigger.to_string());
                snapshot.stale = false;
                snapshot.last_error = None;
                let generation = snapshot.generation;
                drop(state);

                self.generation_tx.send_replace(generation);
                info!(generation, count, trigger, "Contact feed refreshed");
                RefreshOutcome::Updated { generation, count }
            }
            Err(e) => {
                state.snapshot.stale = true;
                state.snapshot.last_error = Some(e.to_string());
                drop(state);

                warn!(error = %e, trigger, "Contact feed refresh failed, keeping previous data");
                RefreshOutcome::Failed(e)
            }
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.read().snapshot.clone()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.state.read().snapshot.contacts.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().snapshot.generation
    }

    /// True once a refresh has been committed and the last one succeeded
    pub fn is_fresh(&self) -> bool {
        let state = self.state.read();
        state.snapshot.generation > 0 && !state.snapshot.stale
    }

    /// Receives the generation after every committed refresh
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::birthdays::tests::contact;
    use cm_db::MemoryDatabase;
    use tokio::sync::Notify;

    /// Returns fixed contacts, optionally waiting on a gate first
    pub struct FixedSource {
        pub contacts: Vec<Contact>,
        pub gate: Option<Arc<Notify>>,
        pub fail: bool,
    }

    impl FixedSource {
        pub fn new(ids: &[i64]) -> Self {
            Self {
                contacts: ids.iter().map(|&id| contact(id, "C", None, 1)).collect(),
                gate: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl FeedSource for FixedSource {
        async fn fetch(&self) -> Result<Vec<Contact>, FeedError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(FeedError::Unavailable("connection refused".into()));
            }
            Ok(self.contacts.clone())
        }
    }

    fn ids(feed: &ContactFeed) -> Vec<i64> {
        feed.contacts().iter().map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn test_refresh_commits_and_publishes() {
        let feed = ContactFeed::new();
        let mut rx = feed.subscribe();
        assert!(!feed.is_fresh());

        let outcome = feed.refresh(&FixedSource::new(&[1, 2]), "poll").await;

        assert!(matches!(outcome, RefreshOutcome::Updated { generation: 1, count: 2 }));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert!(feed.is_fresh());
        assert_eq!(feed.snapshot().trigger.as_deref(), Some("poll"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_data() {
        let feed = ContactFeed::new();
        feed.refresh(&FixedSource::new(&[1]), "poll").await;

        let mut failing = FixedSource::new(&[]);
        failing.fail = true;
        let outcome = feed.refresh(&failing, "poll").await;

        assert!(matches!(outcome, RefreshOutcome::Failed(FeedError::Unavailable(_))));
        let snapshot = feed.snapshot();
        assert!(snapshot.stale);
        assert_eq!(snapshot.generation, 1);
        assert_eq!(ids(&feed), vec![1]);
        assert!(!feed.is_fresh());
    }

    #[tokio::test]
    async fn test_later_fetch_wins_over_slower_earlier_fetch() {
        let feed = ContactFeed::new();
        let gate = Arc::new(Notify::new());

        let mut slow = FixedSource::new(&[1]);
        slow.gate = Some(gate.clone());
        let fast = FixedSource::new(&[1, 2, 3]);

        let slow_refresh = feed.refresh(&slow, "poll");
        let fast_refresh = async {
            let outcome = feed.refresh(&fast, "notify").await;
            gate.notify_one();
            outcome
        };
        let (slow_outcome, fast_outcome) = tokio::join!(slow_refresh, fast_refresh);

        assert!(fast_outcome.is_updated());
        assert!(matches!(slow_outcome, RefreshOutcome::Superseded));
        assert_eq!(ids(&feed), vec![1, 2, 3]);
        assert_eq!(feed.generation(), 1);
    }

    #[tokio::test]
    async fn test_store_source() {
        let db = Arc::new(MemoryDatabase::new());
        db.seed_contact(contact(5, "Seeded", None, 1));
        let source = StoreFeedSource::new(db.clone());

        assert_eq!(source.fetch().await.unwrap().len(), 1);

        db.set_available(false);
        assert!(matches!(source.fetch().await, Err(FeedError::Unavailable(_))));
    }
}
