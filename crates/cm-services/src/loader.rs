//! Contact list loading with fallback
//!
//! Sources are tried in order until one succeeds:
//!
//! 1. `get_collaborative_contacts`
//! 2. `get_all_contacts_superadmin`
//! 3. `get_contacts_filtered`
//! 4. direct table query with the owner join
//! 5. session cache tier
//! 6. local cache tier
//!
//! A source is tried only when the one before it failed or returned an
//! unsuccessful envelope. A successful database load is written through to
//! both cache tiers together with the sync time. When every source fails the
//! result is an empty list with a warning.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cm_auth::CurrentUser;
use cm_core::Envelope;
use cm_db::{ContactStore, RepositoryError, RpcClient};
use cm_models::Contact;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheKey, TieredCache};
use crate::pending::PendingQueue;

/// Where a contact list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Collaborative,
    Superadmin,
    Filtered,
    Direct,
    SessionCache,
    LocalCache,
    /// Every source failed
    Unavailable,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Collaborative => "collaborative",
            SourceKind::Superadmin => "superadmin",
            SourceKind::Filtered => "filtered",
            SourceKind::Direct => "direct",
            SourceKind::SessionCache => "session_cache",
            SourceKind::LocalCache => "local_cache",
            SourceKind::Unavailable => "unavailable",
        }
    }

    pub fn is_cache(&self) -> bool {
        matches!(self, SourceKind::SessionCache | SourceKind::LocalCache)
    }
}

/// Why a source produced no list
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("query failed: {0}")]
    Failed(String),

    #[error("nothing cached")]
    Miss,
}

impl From<RepositoryError> for SourceError {
    fn from(err: RepositoryError) -> Self {
        if err.is_unavailable() {
            SourceError::Unavailable(err.to_string())
        } else {
            SourceError::Failed(err.to_string())
        }
    }
}

fn unwrap_envelope(envelope: Envelope<Vec<Contact>>) -> Result<Vec<Contact>, SourceError> {
    match (envelope.success, envelope.data) {
        (true, Some(contacts)) => Ok(contacts),
        (true, None) => Err(SourceError::Rejected("empty response".to_string())),
        (false, _) => Err(SourceError::Rejected(
            envelope.error.unwrap_or_else(|| "unknown error".to_string()),
        )),
    }
}

/// One step of the fallback chain
#[async_trait]
pub trait ContactSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn load(&self, user: &CurrentUser) -> Result<Vec<Contact>, SourceError>;
}

pub struct CollaborativeSource(pub Arc<dyn RpcClient>);

#[async_trait]
impl ContactSource for CollaborativeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Collaborative
    }

    async fn load(&self, user: &CurrentUser) -> Result<Vec<Contact>, SourceError> {
        unwrap_envelope(self.0.get_collaborative_contacts(user.id).await?)
    }
}

pub struct SuperadminSource(pub Arc<dyn RpcClient>);

#[async_trait]
impl ContactSource for SuperadminSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Superadmin
    }

    async fn load(&self, user: &CurrentUser) -> Result<Vec<Contact>, SourceError> {
        unwrap_envelope(self.0.get_all_contacts_superadmin(user.id).await?)
    }
}

pub struct FilteredSource(pub Arc<dyn RpcClient>);

#[async_trait]
impl ContactSource for FilteredSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Filtered
    }

    async fn load(&self, user: &CurrentUser) -> Result<Vec<Contact>, SourceError> {
        unwrap_envelope(self.0.get_contacts_filtered(user.id, user.role).await?)
    }
}

pub struct DirectSource(pub Arc<dyn ContactStore>);

#[async_trait]
impl ContactSource for DirectSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Direct
    }

    async fn load(&self, _user: &CurrentUser) -> Result<Vec<Contact>, SourceError> {
        Ok(self.0.list().await?)
    }
}

/// A cache tier as a source
pub struct CachedSource {
    cache: Cache,
    kind: SourceKind,
}

impl CachedSource {
    pub fn new(cache: Cache, kind: SourceKind) -> Self {
        Self { cache, kind }
    }
}

#[async_trait]
impl ContactSource for CachedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn load(&self, user: &CurrentUser) -> Result<Vec<Contact>, SourceError> {
        match self
            .cache
            .get::<Vec<Contact>>(&CacheKey::Contacts { user_id: user.id })
            .await
        {
            Ok(Some(cached)) => Ok(cached.value),
            Ok(None) => Err(SourceError::Miss),
            Err(e) => Err(SourceError::Failed(e.to_string())),
        }
    }
}

/// A loaded list and how fresh it is
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedContacts {
    pub contacts: Vec<Contact>,
    pub source: SourceKind,
    /// Served from a cache tier or nothing at all
    pub stale: bool,
    pub warning: Option<String>,
    /// When the list was last loaded from the database
    pub last_sync: Option<DateTime<Utc>>,
}

/// Runs the fallback chain
pub struct ContactLoader {
    sources: Vec<Arc<dyn ContactSource>>,
    cache: TieredCache,
    pending: Option<Arc<PendingQueue>>,
}

impl ContactLoader {
    pub fn new(sources: Vec<Arc<dyn ContactSource>>, cache: TieredCache) -> Self {
        Self {
            sources,
            cache,
            pending: None,
        }
    }

    /// The standard chain over a database and both cache tiers
    pub fn standard(rpc: Arc<dyn RpcClient>, store: Arc<dyn ContactStore>, cache: TieredCache) -> Self {
        let sources: Vec<Arc<dyn ContactSource>> = vec![
            Arc::new(CollaborativeSource(rpc.clone())),
            Arc::new(SuperadminSource(rpc.clone())),
            Arc::new(FilteredSource(rpc)),
            Arc::new(DirectSource(store)),
            Arc::new(CachedSource::new(cache.session.clone(), SourceKind::SessionCache)),
            Arc::new(CachedSource::new(cache.local.clone(), SourceKind::LocalCache)),
        ];
        Self::new(sources, cache)
    }

    /// Append optimistic copies of queued writes to every loaded list
    pub fn with_pending(mut self, pending: Arc<PendingQueue>) -> Self {
        self.pending = Some(pending);
        self
    }

    pub async fn load(&self, user: &CurrentUser) -> LoadedContacts {
        let mut last_error: Option<SourceError> = None;

        for source in &self.sources {
            let kind = source.kind();
            match source.load(user).await {
                Ok(contacts) => {
                    debug!(user_id = user.id, source = kind.as_str(), count = contacts.len(), "Loaded contacts");
                    return self.finish(user, contacts, kind, last_error).await;
                }
                Err(SourceError::Miss) => {
                    debug!(user_id = user.id, source = kind.as_str(), "Cache miss");
                }
                Err(e) => {
                    warn!(user_id = user.id, source = kind.as_str(), error = %e, "Contact source failed");
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no source configured".to_string());
        warn!(user_id = user.id, reason = %reason, "No contact source succeeded");

        let mut loaded = LoadedContacts {
            contacts: Vec::new(),
            source: SourceKind::Unavailable,
            stale: true,
            warning: Some(format!("Contacts could not be loaded: {}", reason)),
            last_sync: self.last_sync(user).await,
        };
        self.append_pending(&mut loaded.contacts).await;
        loaded
    }

    async fn finish(
        &self,
        user: &CurrentUser,
        contacts: Vec<Contact>,
        kind: SourceKind,
        last_error: Option<SourceError>,
    ) -> LoadedContacts {
        let mut loaded = if kind.is_cache() {
            let last_sync = self.last_sync(user).await;
            let since = last_sync
                .map(|at| format!(" from {}", at.format("%Y-%m-%d %H:%M UTC")))
                .unwrap_or_default();
            let reason = last_error
                .map(|e| format!(" ({})", e))
                .unwrap_or_default();
            LoadedContacts {
                contacts,
                source: kind,
                stale: true,
                warning: Some(format!("Showing cached contacts{}; the database is unreachable{}", since, reason)),
                last_sync,
            }
        } else {
            let now = Utc::now();
            self.cache.put(&CacheKey::Contacts { user_id: user.id }, &contacts).await;
            self.cache.put(&CacheKey::LastSync { user_id: user.id }, &now).await;
            info!(user_id = user.id, source = kind.as_str(), count = contacts.len(), "Contacts synced");
            LoadedContacts {
                contacts,
                source: kind,
                stale: false,
                warning: None,
                last_sync: Some(now),
            }
        };

        self.append_pending(&mut loaded.contacts).await;
        loaded
    }

    async fn last_sync(&self, user: &CurrentUser) -> Option<DateTime<Utc>> {
        let key = CacheKey::LastSync { user_id: user.id };
        for cache in [&self.cache.session, &self.cache.local] {
            if let Ok(Some(cached)) = cache.get::<DateTime<Utc>>(&key).await {
                return Some(cached.value);
            }
        }
        None
    }

    async fn append_pending(&self, contacts: &mut Vec<Contact>) {
        let Some(pending) = &self.pending else {
            return;
        };
        match pending.optimistic_contacts().await {
            Ok(optimistic) => {
                for contact in optimistic {
                    if !contacts.iter().any(|c| c.id == contact.id) {
                        contacts.push(contact);
                    }
                }
            }
            Err(e) => warn!(error = %e, "Could not read pending contact writes"),
        }
    }
}
