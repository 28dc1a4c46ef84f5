//! Contact services
//!
//! Reads go through the [`ContactLoader`] fallback chain; writes run the
//! contact contracts, record a changelog entry and invalidate every cached
//! contact list.

mod create;
mod delete;
mod update;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cm_auth::CurrentUser;
use cm_changelog::ChangelogService;
use cm_core::traits::Id;
use cm_core::{CmError, CmResult};
use cm_db::ContactStore;
use cm_models::{Capability, Contact, NewContact, UpdateContact};
use cm_queries::ContactQuery;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::TieredCache;
use crate::loader::{ContactLoader, LoadedContacts, SourceKind};
use crate::pending::PendingQueue;
use crate::result::ServiceResult;

pub use create::CreateContactService;
pub use delete::DeleteContactService;
pub use update::UpdateContactService;

/// One page of a filtered contact list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactList {
    pub contacts: Vec<Contact>,
    /// Matches before paging
    pub total: usize,
    pub source: SourceKind,
    pub stale: bool,
    pub warning: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Entry point for contact operations
pub struct ContactService {
    pub(crate) contacts: Arc<dyn ContactStore>,
    pub(crate) loader: Arc<ContactLoader>,
    pub(crate) pending: Arc<PendingQueue>,
    pub(crate) changelog: Arc<ChangelogService>,
    pub(crate) cache: TieredCache,
}

impl ContactService {
    pub fn new(
        contacts: Arc<dyn ContactStore>,
        loader: Arc<ContactLoader>,
        pending: Arc<PendingQueue>,
        changelog: Arc<ChangelogService>,
        cache: TieredCache,
    ) -> Self {
        Self {
            contacts,
            loader,
            pending,
            changelog,
            cache,
        }
    }

    /// The full list as loaded by the fallback chain
    pub async fn load(&self, user: &CurrentUser) -> CmResult<LoadedContacts> {
        if !user.can(Capability::ViewContacts) {
            return Err(CmError::forbidden("You are not allowed to view contacts"));
        }
        Ok(self.loader.load(user).await)
    }

    /// Filter, sort and page the loaded list
    pub async fn list(&self, user: &CurrentUser, query: &ContactQuery) -> CmResult<ContactList> {
        let loaded = self.load(user).await?;

        let total = query.filter_set().apply(loaded.contacts.clone()).len();
        let contacts = query.apply(loaded.contacts);

        debug!(user_id = user.id, total, returned = contacts.len(), "Listed contacts");
        Ok(ContactList {
            contacts,
            total,
            source: loaded.source,
            stale: loaded.stale,
            warning: loaded.warning,
            last_sync: loaded.last_sync,
        })
    }

    /// A single contact; looked up in the loaded list while the database
    /// is unreachable
    pub async fn get(&self, user: &CurrentUser, id: Id) -> CmResult<Contact> {
        if !user.can(Capability::ViewContacts) {
            return Err(CmError::forbidden("You are not allowed to view contacts"));
        }

        match self.contacts.find_by_id(id).await {
            Ok(Some(contact)) => Ok(contact),
            Ok(None) if id >= 0 => Err(CmError::not_found("Contact", id)),
            Ok(None) => self.find_loaded(user, id).await,
            Err(e) if e.is_unavailable() => {
                warn!(contact_id = id, error = %e, "Contact lookup unavailable, searching loaded list");
                self.find_loaded(user, id).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_loaded(&self, user: &CurrentUser, id: Id) -> CmResult<Contact> {
        self.loader
            .load(user)
            .await
            .contacts
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CmError::not_found("Contact", id))
    }

    pub async fn create(
        &self,
        user: &CurrentUser,
        params: NewContact,
    ) -> CmResult<ServiceResult<Contact>> {
        CreateContactService::new(self, user).call(params).await
    }

    pub async fn update(
        &self,
        user: &CurrentUser,
        id: Id,
        changes: UpdateContact,
    ) -> CmResult<ServiceResult<Contact>> {
        UpdateContactService::new(self, user).call(id, changes).await
    }

    pub async fn delete(&self, user: &CurrentUser, id: Id) -> CmResult<ServiceResult<Contact>> {
        DeleteContactService::new(self, user).call(id).await
    }

    pub fn pending(&self) -> &Arc<PendingQueue> {
        &self.pending
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use cm_models::Role;

    #[tokio::test]
    async fn test_list_applies_query() {
        let f = fixture();
        let user = account(&f.db, "una", Role::User).await;
        for (first, last) in [("Ada", "Lovelace"), ("Grace", "Hopper"), ("Alan", "Turing")] {
            f.service.create(&user, new_contact(first, last)).await.unwrap();
        }

        let query = ContactQuery {
            q: Some("a".into()),
            limit: Some(1),
            ..Default::default()
        };
        let list = f.service.list(&user, &query).await.unwrap();

        assert_eq!(list.total, 3);
        assert_eq!(list.contacts.len(), 1);
        assert_eq!(list.source, SourceKind::Collaborative);
        assert!(!list.stale);
    }

    #[tokio::test]
    async fn test_get_during_outage_uses_cache() {
        let f = fixture();
        let user = account(&f.db, "una", Role::User).await;
        let created = f.service.create(&user, new_contact("Ada", "Lovelace")).await.unwrap();
        let id = created.result().unwrap().id;
        f.service.list(&user, &ContactQuery::default()).await.unwrap();

        f.db.set_available(false);
        let contact = f.service.get(&user, id).await.unwrap();
        assert_eq!(contact.last_name, "Lovelace");
        assert_eq!(f.service.get(&user, id + 100).await.unwrap_err().status_code(), 404);
    }
}
