//! Contact writes waiting for the database
//!
//! When the database is unreachable a new contact is accepted optimistically:
//! the caller gets a copy marked `pending_sync` with a temporary negative id,
//! and the write is queued in the local cache tier so it is replayed on the
//! next start or manual sync.

use chrono::{DateTime, Utc};
use cm_core::traits::Id;
use cm_models::{Contact, NewContact};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::cache::{Cache, CacheKey, CacheResult};

/// A queued contact write
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub id: String,
    pub owner_id: Id,
    pub owner_name: String,
    pub contact: NewContact,
    /// Id of the optimistic copy handed out while queued
    pub local_id: Id,
    pub queued_at: DateTime<Utc>,
}

impl PendingOperation {
    /// The optimistic copy shown until the write is confirmed
    pub fn optimistic_contact(&self) -> Contact {
        let mut contact = self.contact.clone().into_contact(
            self.local_id,
            self.owner_id,
            Some(self.owner_name.clone()),
        );
        contact.created_at = self.queued_at;
        contact.updated_at = self.queued_at;
        contact.pending_sync = true;
        contact
    }
}

/// Queue persisted under [`CacheKey::PendingOperations`], never expiring
pub struct PendingQueue {
    cache: Cache,
    lock: Mutex<()>,
}

impl PendingQueue {
    pub fn new(cache: Cache) -> Self {
        Self {
            cache,
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> CacheResult<Vec<PendingOperation>> {
        Ok(self
            .cache
            .get::<Vec<PendingOperation>>(&CacheKey::PendingOperations)
            .await?
            .map(|cached| cached.value)
            .unwrap_or_default())
    }

    async fn write(&self, operations: &[PendingOperation]) -> CacheResult<()> {
        if operations.is_empty() {
            self.cache.remove(&CacheKey::PendingOperations).await
        } else {
            self.cache
                .put_with_ttl(&CacheKey::PendingOperations, operations, None)
                .await
        }
    }

    /// Queue a contact create and return the operation
    pub async fn enqueue(
        &self,
        owner_id: Id,
        owner_name: &str,
        contact: NewContact,
    ) -> CacheResult<PendingOperation> {
        let _guard = self.lock.lock().await;
        let mut operations = self.read().await?;

        let local_id = operations.iter().map(|op| op.local_id).min().unwrap_or(0).min(0) - 1;
        let operation = PendingOperation {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id,
            owner_name: owner_name.to_string(),
            contact,
            local_id,
            queued_at: Utc::now(),
        };
        operations.push(operation.clone());
        self.write(&operations).await?;

        info!(operation_id = %operation.id, owner_id, queued = operations.len(), "Queued contact write");
        Ok(operation)
    }

    /// Queued operations, oldest first
    pub async fn list(&self) -> CacheResult<Vec<PendingOperation>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    pub async fn remove(&self, operation_id: &str) -> CacheResult<bool> {
        let _guard = self.lock.lock().await;
        let mut operations = self.read().await?;
        let before = operations.len();
        operations.retain(|op| op.id != operation_id);
        let removed = operations.len() != before;
        if removed {
            self.write(&operations).await?;
        }
        Ok(removed)
    }

    pub async fn len(&self) -> CacheResult<usize> {
        Ok(self.list().await?.len())
    }

    pub async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Optimistic copies of every queued create
    pub async fn optimistic_contacts(&self) -> CacheResult<Vec<Contact>> {
        Ok(self
            .list()
            .await?
            .iter()
            .map(PendingOperation::optimistic_contact)
            .collect())
    }
}
