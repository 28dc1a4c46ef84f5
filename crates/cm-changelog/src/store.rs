//! Changelog persistence

use async_trait::async_trait;
use cm_core::traits::Id;
use cm_core::CmError;
use cm_models::{ChangelogEntity, ChangelogEntry, NewChangelogEntry};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Changelog errors
#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("Changelog storage error: {0}")]
    Storage(String),
    #[error("Changelog storage unavailable: {0}")]
    Unavailable(String),
}

pub type ChangelogResult<T> = Result<T, ChangelogError>;

impl From<ChangelogError> for CmError {
    fn from(err: ChangelogError) -> Self {
        match err {
            ChangelogError::Storage(message) => CmError::Database(message),
            ChangelogError::Unavailable(message) => CmError::Unavailable { message },
        }
    }
}

/// Append-only store for changelog entries
///
/// Listing methods return newest entries first.
#[async_trait]
pub trait ChangelogStore: Send + Sync {
    async fn append(&self, entry: NewChangelogEntry) -> ChangelogResult<ChangelogEntry>;

    async fn recent(&self, limit: usize) -> ChangelogResult<Vec<ChangelogEntry>>;

    async fn by_actor(&self, actor_id: Id, limit: usize) -> ChangelogResult<Vec<ChangelogEntry>>;

    async fn by_entity(
        &self,
        entity: ChangelogEntity,
        entity_id: Id,
    ) -> ChangelogResult<Vec<ChangelogEntry>>;

    async fn count(&self) -> ChangelogResult<usize>;
}

/// In-memory changelog store
pub struct MemoryChangelogStore {
    entries: RwLock<Vec<ChangelogEntry>>,
    next_id: AtomicI64,
}

impl Default for MemoryChangelogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChangelogStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn newest_first<F>(&self, limit: usize, predicate: F) -> Vec<ChangelogEntry>
    where
        F: Fn(&ChangelogEntry) -> bool,
    {
        let entries = self.entries.read();
        let mut matching: Vec<_> = entries.iter().filter(|e| predicate(e)).cloned().collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        matching.truncate(limit);
        matching
    }
}

#[async_trait]
impl ChangelogStore for MemoryChangelogStore {
    async fn append(&self, entry: NewChangelogEntry) -> ChangelogResult<ChangelogEntry> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = entry.into_entry(id);
        self.entries.write().push(entry.clone());
        Ok(entry)
    }

    async fn recent(&self, limit: usize) -> ChangelogResult<Vec<ChangelogEntry>> {
        Ok(self.newest_first(limit, |_| true))
    }

    async fn by_actor(&self, actor_id: Id, limit: usize) -> ChangelogResult<Vec<ChangelogEntry>> {
        Ok(self.newest_first(limit, |e| e.actor_id == Some(actor_id)))
    }

    async fn by_entity(
        &self,
        entity: ChangelogEntity,
        entity_id: Id,
    ) -> ChangelogResult<Vec<ChangelogEntry>> {
        Ok(self.newest_first(usize::MAX, |e| {
            e.entity == entity && e.entity_id == Some(entity_id)
        }))
    }

    async fn count(&self) -> ChangelogResult<usize> {
        Ok(self.entries.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ChangelogBuilder;
    use chrono::{Duration, Utc};
    use cm_models::ChangelogAction;

    #[tokio::test]
    async fn test_append_assigns_ids() {
        let store = MemoryChangelogStore::new();
        let first = store
            .append(ChangelogBuilder::system(ChangelogAction::Login, "a").build())
            .await
            .unwrap();
        let second = store
            .append(ChangelogBuilder::system(ChangelogAction::Logout, "b").build())
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let store = MemoryChangelogStore::new();
        let now = Utc::now();
        for (i, offset) in [3, 1, 2].into_iter().enumerate() {
            store
                .append(
                    ChangelogBuilder::system(ChangelogAction::Export, format!("e{}", i))
                        .at(now - Duration::minutes(offset))
                        .build(),
                )
                .await
                .unwrap();
        }

        let recent = store.recent(2).await.unwrap();
        let descriptions: Vec<_> = recent.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn test_by_actor_and_entity() {
        let store = MemoryChangelogStore::new();
        let contact = crate::builder::tests::contact(9, 1);

        store
            .append(ChangelogBuilder::contact(ChangelogAction::Create, &contact).actor(1, "Ada").build())
            .await
            .unwrap();
        store
            .append(ChangelogBuilder::contact(ChangelogAction::Update, &contact).actor(2, "Bob").build())
            .await
            .unwrap();
        store
            .append(ChangelogBuilder::system(ChangelogAction::Login, "login").actor(2, "Bob").build())
            .await
            .unwrap();

        assert_eq!(store.by_actor(2, 10).await.unwrap().len(), 2);
        assert_eq!(
            store.by_entity(ChangelogEntity::Contact, 9).await.unwrap().len(),
            2
        );
        assert!(store.by_entity(ChangelogEntity::User, 9).await.unwrap().is_empty());
    }
}
