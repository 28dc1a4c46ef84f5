//! Changelog Service
//!
//! Records audit entries and answers history queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cm_core::traits::Id;
use cm_models::{ChangelogAction, ChangelogEntity, ChangelogEntry, Contact, NewChangelogEntry};

use crate::builder::ChangelogBuilder;
use crate::store::{ChangelogResult, ChangelogStore};

/// Event emitted after an entry is stored
#[derive(Debug, Clone)]
pub struct ChangelogEvent {
    pub entry: ChangelogEntry,
    pub recorded_at: DateTime<Utc>,
}

type Handler = Box<dyn Fn(&ChangelogEvent) + Send + Sync>;

/// Changelog service
pub struct ChangelogService {
    store: Arc<dyn ChangelogStore>,
    event_handlers: Vec<Handler>,
}

impl ChangelogService {
    pub fn new(store: Arc<dyn ChangelogStore>) -> Self {
        Self {
            store,
            event_handlers: Vec::new(),
        }
    }

    /// Register an event handler
    pub fn on_entry_recorded<F>(&mut self, handler: F)
    where
        F: Fn(&ChangelogEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Box::new(handler));
    }

    pub async fn record(&self, entry: NewChangelogEntry) -> ChangelogResult<ChangelogEntry> {
        let entry = self.store.append(entry).await?;

        tracing::debug!(
            id = entry.id,
            action = %entry.action,
            entity = %entry.entity,
            actor_id = ?entry.actor_id,
            "Recorded changelog entry"
        );

        let event = ChangelogEvent {
            entry: entry.clone(),
            recorded_at: Utc::now(),
        };
        self.emit_event(&event);

        Ok(entry)
    }

    /// Record an entry; a storage failure is logged and swallowed so the
    /// audited operation itself still succeeds
    pub async fn record_logged(&self, entry: NewChangelogEntry) -> Option<ChangelogEntry> {
        let action = entry.action;
        match self.record(entry).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, action = %action, "Failed to record changelog entry");
                None
            }
        }
    }

    pub async fn record_login(&self, user_id: Id, name: &str) -> Option<ChangelogEntry> {
        let entry = ChangelogBuilder::new(ChangelogAction::Login, ChangelogEntity::User)
            .actor(user_id, name)
            .entity_id(user_id)
            .description(format!("{} logged in", name))
            .build();
        self.record_logged(entry).await
    }

    pub async fn record_logout(&self, user_id: Id, name: &str) -> Option<ChangelogEntry> {
        let entry = ChangelogBuilder::new(ChangelogAction::Logout, ChangelogEntity::User)
            .actor(user_id, name)
            .entity_id(user_id)
            .description(format!("{} logged out", name))
            .build();
        self.record_logged(entry).await
    }

    /// Record a bulk export; `what` names the exported list ("contacts", "changelog")
    pub async fn record_export(
        &self,
        user_id: Id,
        name: &str,
        what: &str,
        count: usize,
    ) -> Option<ChangelogEntry> {
        let entry = ChangelogBuilder::system(
            ChangelogAction::Export,
            format!("Exported {} {} as CSV", count, what),
        )
        .actor(user_id, name)
        .detail("format", "csv")
        .detail("count", count)
        .build();
        self.record_logged(entry).await
    }

    pub async fn record_download(
        &self,
        user_id: Id,
        name: &str,
        contact: &Contact,
    ) -> Option<ChangelogEntry> {
        let entry = ChangelogBuilder::contact(ChangelogAction::Download, contact)
            .actor(user_id, name)
            .description(format!("Downloaded vCard for {}", contact.full_name()))
            .detail("format", "vcard")
            .build();
        self.record_logged(entry).await
    }

    pub async fn recent(&self, limit: usize) -> ChangelogResult<Vec<ChangelogEntry>> {
        self.store.recent(limit).await
    }

    pub async fn by_actor(&self, actor_id: Id, limit: usize) -> ChangelogResult<Vec<ChangelogEntry>> {
        self.store.by_actor(actor_id, limit).await
    }

    /// All entries for one entity, newest first
    pub async fn history(
        &self,
        entity: ChangelogEntity,
        entity_id: Id,
    ) -> ChangelogResult<Vec<ChangelogEntry>> {
        self.store.by_entity(entity, entity_id).await
    }

    pub async fn count(&self) -> ChangelogResult<usize> {
        self.store.count().await
    }

    fn emit_event(&self, event: &ChangelogEvent) {
        for handler in &self.event_handlers {
            handler(event);
        }
    }
}
