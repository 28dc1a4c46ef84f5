//! Replay of queued contact writes
//!
//! Runs at startup and on manual sync. Operations are replayed oldest
//! first; the first "database unavailable" error stops the run and leaves
//! the rest queued. Operations the database rejects for any other reason
//! are dropped. Only one flush runs at a time.

use std::sync::Arc;

use cm_auth::CurrentUser;
use cm_changelog::{ChangelogBuilder, ChangelogService};
use cm_core::CmResult;
use cm_db::ContactStore;
use cm_models::ChangelogAction;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::cache::TieredCache;
use crate::loader::{ContactLoader, LoadedContacts};
use crate::pending::PendingQueue;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub replayed: usize,
    pub failed: usize,
    pub remaining: usize,
}

/// A flush followed by a fresh load
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub report: SyncReport,
    #[serde(flatten)]
    pub loaded: LoadedContacts,
}

pub struct SyncService {
    contacts: Arc<dyn ContactStore>,
    pending: Arc<PendingQueue>,
    changelog: Arc<ChangelogService>,
    cache: TieredCache,
    loader: Arc<ContactLoader>,
    flushing: Mutex<()>,
}

impl SyncService {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        pending: Arc<PendingQueue>,
        changelog: Arc<ChangelogService>,
        cache: TieredCache,
        loader: Arc<ContactLoader>,
    ) -> Self {
        Self {
            contacts,
            pending,
            changelog,
            cache,
            loader,
            flushing: Mutex::new(()),
        }
    }

    /// Replay every queued create
    pub async fn flush(&self) -> CmResult<SyncReport> {
        let _flushing = self.flushing.lock().await;
        let operations = self.pending.list().await?;
        let mut report = SyncReport::default();

        for operation in operations {
            match self.contacts.create(operation.owner_id, &operation.contact).await {
                Ok(created) => {
                    self.pending.remove(&operation.id).await?;
                    let entry = ChangelogBuilder::contact(ChangelogAction::Create, &created)
                        .actor(operation.owner_id, operation.owner_name.as_str())
                        .detail("queuedAt", operation.queued_at)
                        .build();
                    self.changelog.record_logged(entry).await;
                    report.replayed += 1;
                    info!(operation_id = %operation.id, contact_id = created.id, "Replayed queued contact");
                }
                Err(e) if e.is_unavailable() => {
                    warn!(operation_id = %operation.id, error = %e, "Database still unreachable, sync stopped");
                    break;
                }
                Err(e) => {
                    self.pending.remove(&operation.id).await?;
                    report.failed += 1;
                    error!(operation_id = %operation.id, error = %e, "Dropped queued contact the database rejected");
                }
            }
        }

        if report.replayed > 0 {
            self.cache.invalidate_contacts().await;
        }
        report.remaining = self.pending.len().await?;

        if report.replayed > 0 || report.failed > 0 {
            info!(
                replayed = report.replayed,
                failed = report.failed,
                remaining = report.remaining,
                "Pending sync finished"
            );
        }
        Ok(report)
    }

    /// Manual sync: flush, drop cached lists, reload
    pub async fn sync(&self, user: &CurrentUser) -> CmResult<SyncOutcome> {
        let report = self.flush().await?;
        self.cache.invalidate_contacts().await;
        let loaded = self.loader.load(user).await;
        Ok(SyncOutcome { report, loaded })
    }
}
