//! User services
//!
//! Account administration: listing, creation with generated usernames and
//! temporary passwords, profile updates and deletion.

mod create;
mod delete;
mod update;

use std::sync::Arc;

use cm_auth::{CurrentUser, PasswordPolicy, SessionStore};
use cm_changelog::ChangelogService;
use cm_contracts::users::UserData;
use cm_core::error::ValidationErrors;
use cm_core::traits::Id;
use cm_core::{CmError, CmResult};
use cm_db::{suggest_username, ContactStore, RpcClient, UserStore};
use cm_models::{Capability, NewUser, Role, UpdateUser, User};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, TieredCache};
use crate::result::ServiceResult;

pub use create::{CreateUserService, CreatedUser};
pub use delete::DeleteUserService;
pub use update::UpdateUserService;

/// User data not yet persisted, as seen by the contracts
pub(crate) struct UserDraft<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub role: Role,
    pub employee_number: Option<&'a str>,
}

impl UserData for UserDraft<'_> {
    fn id(&self) -> Option<Id> {
        None
    }

    fn name(&self) -> &str {
        self.name
    }

    fn email(&self) -> &str {
        self.email
    }

    fn username(&self) -> &str {
        self.username
    }

    fn role(&self) -> Role {
        self.role
    }

    fn employee_number(&self) -> Option<&str> {
        self.employee_number
    }
}

/// Entry point for user operations
pub struct UserService {
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) contacts: Arc<dyn ContactStore>,
    pub(crate) rpc: Arc<dyn RpcClient>,
    pub(crate) changelog: Arc<ChangelogService>,
    pub(crate) cache: TieredCache,
    pub(crate) policy: PasswordPolicy,
    pub(crate) sessions: Option<Arc<dyn SessionStore>>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        contacts: Arc<dyn ContactStore>,
        rpc: Arc<dyn RpcClient>,
        changelog: Arc<ChangelogService>,
        cache: TieredCache,
    ) -> Self {
        Self {
            users,
            contacts,
            rpc,
            changelog,
            cache,
            policy: PasswordPolicy::default(),
            sessions: None,
        }
    }

    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sessions to revoke when an account loses its role or is deleted
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// All users; served from the cache while the database is unreachable
    pub async fn list(&self, user: &CurrentUser) -> CmResult<Vec<User>> {
        if !user.can(Capability::ViewUsers) {
            return Err(CmError::forbidden("You are not allowed to view users"));
        }

        match self.users.list().await {
            Ok(users) => {
                self.cache.put(&CacheKey::Users, &users).await;
                Ok(users)
            }
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, "User list unavailable, trying cache");
                for cache in [&self.cache.session, &self.cache.local] {
                    if let Ok(Some(cached)) = cache.get::<Vec<User>>(&CacheKey::Users).await {
                        return Ok(cached.value);
                    }
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, user: &CurrentUser, id: Id) -> CmResult<User> {
        if id != user.id && !user.can(Capability::ViewUsers) {
            return Err(CmError::forbidden("You are not allowed to view users"));
        }
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| CmError::not_found("User", id))
    }

    /// Username suggestion for a display name
    ///
    /// Asks the database function first and falls back to local generation
    /// against the current user list.
    pub async fn generate_username(&self, name: &str) -> CmResult<String> {
        match self.rpc.generate_username(name).await {
            Ok(envelope) if envelope.success => {
                if let Some(username) = envelope.data.filter(|u| !u.is_empty()) {
                    return Ok(username);
                }
            }
            Ok(envelope) => {
                debug!(error = ?envelope.error, "Username function rejected the request");
            }
            Err(e) => {
                warn!(error = %e, "Username function failed, generating locally");
            }
        }

        let taken: Vec<String> = self
            .users
            .list()
            .await?
            .into_iter()
            .map(|u| u.username.to_lowercase())
            .collect();
        suggest_username(name, |candidate| {
            taken.iter().any(|t| t == &candidate.to_lowercase())
        })
        .ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add("name", "can't be blank");
            CmError::Validation(errors)
        })
    }

    pub async fn create(
        &self,
        user: &CurrentUser,
        params: NewUser,
    ) -> CmResult<ServiceResult<CreatedUser>> {
        CreateUserService::new(self, user).call(params).await
    }

    pub async fn update(
        &self,
        user: &CurrentUser,
        id: Id,
        changes: UpdateUser,
    ) -> CmResult<ServiceResult<User>> {
        UpdateUserService::new(self, user).call(id, changes).await
    }

    pub async fn delete(
        &self,
        user: &CurrentUser,
        id: Id,
    ) -> CmResult<ServiceResult<User>> {
        DeleteUserService::new(self, user).call(id).await
    }

    /// Sign the account out everywhere; tokens carry the role they were issued with
    pub(crate) fn revoke_sessions(&self, id: Id) {
        if let Some(sessions) = &self.sessions {
            let revoked = sessions.delete_user_sessions(id);
            if revoked > 0 {
                info!(user_id = id, revoked, "Revoked sessions");
            }
        }
    }

    /// Drop cached user lists after a write made here or elsewhere
    pub async fn after_write(&self) {
        self.cache.invalidate(&CacheKey::Users).await;
        // Contact lists carry owner names
        self.cache.invalidate_contacts().await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use cm_auth::{MemorySessionStore, Session};
    use cm_changelog::MemoryChangelogStore;
    use cm_db::{CreateUserDto, MemoryDatabase};

    pub struct Fixture {
        pub service: UserService,
        pub db: Arc<MemoryDatabase>,
        pub changelog: Arc<ChangelogService>,
        pub sessions: Arc<MemorySessionStore>,
    }

    pub fn fixture() -> Fixture {
        let db = Arc::new(MemoryDatabase::new());
        let changelog = Arc::new(ChangelogService::new(Arc::new(MemoryChangelogStore::new())));
        let sessions = Arc::new(MemorySessionStore::new());
        let service = UserService::new(
            db.clone(),
            db.clone(),
            db.clone(),
            changelog.clone(),
            TieredCache::in_memory(Some(3600)),
        )
        .with_sessions(sessions.clone());
        Fixture {
            service,
            db,
            changelog,
            sessions,
        }
    }

    pub async fn account(db: &MemoryDatabase, name: &str, username: &str, role: Role) -> CurrentUser {
        let user = UserStore::create(
            db,
            CreateUserDto {
                name: name.into(),
                email: format!("{}@example.com", username),
                username: username.into(),
                role,
                employee_number: None,
                position: None,
                avatar: None,
                hashed_password: None,
                must_change_password: false,
            },
        )
        .await
        .unwrap();
        CurrentUser::from(&user)
    }

    /// A live session for `user`, keyed by `jti`
    pub fn signed_in(sessions: &MemorySessionStore, user: &CurrentUser, jti: &str) {
        let expires = chrono::Utc::now() + chrono::Duration::hours(1);
        sessions.set(Session::new(jti, user.id, expires)).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_list_falls_back_to_cache() {
        let f = fixture();
        let admin = account(&f.db, "Ada Admin", "ada", Role::Admin).await;

        assert_eq!(f.service.list(&admin).await.unwrap().len(), 1);

        f.db.set_available(false);
        let cached = f.service.list(&admin).await.unwrap();
        assert_eq!(cached[0].username, "ada");
    }

    #[tokio::test]
    async fn test_get_other_user_requires_view_users() {
        let f = fixture();
        let user = account(&f.db, "Una User", "una", Role::User).await;
        let other = account(&f.db, "Otto Other", "otto", Role::User).await;

        // every role may view users
        assert_eq!(f.service.get(&user, other.id).await.unwrap().username, "otto");
        assert_eq!(f.service.get(&user, 999).await.unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn test_generate_username() {
        let f = fixture();
        account(&f.db, "Jane Doe", "jdoe", Role::User).await;

        let suggestion = f.service.generate_username("Jane Doe").await.unwrap();
        assert_ne!(suggestion, "jdoe");
        assert!(suggestion.starts_with("jdoe"));

        let err = f.service.generate_username("   ").await.unwrap_err();
        assert_eq!(err.status_code(), 422);
    }
}
