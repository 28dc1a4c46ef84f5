//! Authentication Service
//!
//! Login, logout and password management. Every successful login and
//! logout is recorded in the changelog; password changes and resets are
//! recorded as user updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cm_auth::{
    generate_temporary_password, hash_password, verify_password, CurrentUser, JwtService,
    PasswordPolicy, Session, SessionStore,
};
use cm_changelog::{ChangelogBuilder, ChangelogService};
use cm_core::error::ValidationErrors;
use cm_core::traits::Id;
use cm_core::{CmError, CmResult};
use cm_db::UserStore;
use cm_models::{Capability, ChangelogAction, Role, User};
use tracing::{info, instrument, warn};

use crate::result::ServiceResult;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// A signed-in session
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: String,
    /// Token id; also the session key
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Outcome of an administrative password reset
#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub user: User,
    /// Shown once to the administrator
    pub temporary_password: String,
    pub revoked_sessions: usize,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt: Arc<JwtService>,
    sessions: Arc<dyn SessionStore>,
    changelog: Arc<ChangelogService>,
    token_ttl_seconds: i64,
    policy: PasswordPolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        jwt: Arc<JwtService>,
        sessions: Arc<dyn SessionStore>,
        changelog: Arc<ChangelogService>,
    ) -> Self {
        Self {
            users,
            jwt,
            sessions,
            changelog,
            token_ttl_seconds: 86400,
            policy: PasswordPolicy::default(),
        }
    }

    pub fn with_token_ttl(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sign in by username or email
    #[instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> CmResult<LoginResult> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(CmError::unauthorized(INVALID_CREDENTIALS));
        }

        let user = self.users.find_by_login(login).await?;
        let Some(user) = user else {
            info!("Login failed: unknown account");
            return Err(CmError::unauthorized(INVALID_CREDENTIALS));
        };

        let matches = user
            .hashed_password
            .as_deref()
            .map(|hash| verify_password(password, hash))
            .unwrap_or(false);
        if !matches {
            info!(user_id = user.id, "Login failed: wrong password");
            return Err(CmError::unauthorized(INVALID_CREDENTIALS));
        }

        let issued = self
            .jwt
            .create_token(&user, self.token_ttl_seconds)
            .map_err(|e| CmError::Internal(e.to_string()))?;
        self.sessions
            .set(Session::new(issued.jti.clone(), user.id, issued.expires_at))
            .map_err(|e| CmError::Internal(e.to_string()))?;

        if let Err(e) = self.users.touch_last_login(user.id).await {
            warn!(user_id = user.id, error = %e, "Could not update last login time");
        }
        self.changelog.record_login(user.id, &user.name).await;

        info!(user_id = user.id, role = user.role.as_str(), "User logged in");
        Ok(LoginResult {
            token: issued.token,
            session_id: issued.jti,
            expires_at: issued.expires_at,
            user,
        })
    }

    /// Revoke the session the user authenticated with
    pub async fn logout(&self, user: &CurrentUser) -> CmResult<()> {
        if let Some(session_id) = &user.session_id {
            if self.sessions.delete(session_id).is_err() {
                warn!(user_id = user.id, "Logout for an unknown session");
            }
        }
        self.changelog
            .record_logout(user.id, user.display_name())
            .await;
        info!(user_id = user.id, "User logged out");
        Ok(())
    }

    /// Change the caller's own password
    #[instrument(skip_all, fields(user_id = user.id))]
    pub async fn change_password(
        &self,
        user: &CurrentUser,
        current_password: &str,
        new_password: &str,
    ) -> CmResult<ServiceResult<()>> {
        let account = self
            .users
            .find_by_id(user.id)
            .await?
            .ok_or_else(|| CmError::not_found("User", user.id))?;

        let mut errors = ValidationErrors::new();
        let current_ok = account
            .hashed_password
            .as_deref()
            .map(|hash| verify_password(current_password, hash))
            .unwrap_or(false);
        if !current_ok {
            errors.add("currentPassword", "is incorrect");
        }
        for message in self.policy.violations(new_password) {
            errors.add("password", message);
        }
        if new_password == current_password {
            errors.add("password", "must differ from the current password");
        }
        if !errors.is_empty() {
            return Ok(ServiceResult::failure(errors));
        }

        let hashed = hash_password(new_password).map_err(|e| CmError::Internal(e.to_string()))?;
        self.users.update_password(user.id, &hashed, false).await?;

        let entry = ChangelogBuilder::user(ChangelogAction::Update, &account)
            .actor(user.id, user.display_name())
            .description(format!("{} changed their password", account.username))
            .detail("password", "changed")
            .build();
        self.changelog.record_logged(entry).await;

        info!("Password changed");
        Ok(ServiceResult::success(()))
    }

    /// Replace a user's password with a temporary one and end their sessions
    #[instrument(skip(self, admin), fields(admin_id = admin.id))]
    pub async fn reset_password(&self, admin: &CurrentUser, user_id: Id) -> CmResult<PasswordReset> {
        if !admin.can(Capability::ManageUsers) {
            return Err(CmError::forbidden("Only administrators can reset passwords"));
        }

        let target = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| CmError::not_found("User", user_id))?;

        if target.role == Role::Superadmin && !admin.can(Capability::AssignSuperadmin) {
            return Err(CmError::forbidden(
                "Only superadmins can reset a superadmin's password",
            ));
        }

        let temporary_password = generate_temporary_password();
        let hashed =
            hash_password(&temporary_password).map_err(|e| CmError::Internal(e.to_string()))?;
        self.users.update_password(target.id, &hashed, true).await?;
        let revoked_sessions = self.sessions.delete_user_sessions(target.id);

        let entry = ChangelogBuilder::user(ChangelogAction::Update, &target)
            .actor(admin.id, admin.display_name())
            .description(format!("Reset password for {}", target.username))
            .detail("password", "reset")
            .build();
        self.changelog.record_logged(entry).await;

        info!(user_id = target.id, revoked_sessions, "Password reset");
        Ok(PasswordReset {
            user: target,
            temporary_password,
            revoked_sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_auth::MemorySessionStore;
    use cm_changelog::MemoryChangelogStore;
    use cm_db::{CreateUserDto, MemoryDatabase};

    struct Fixture {
        service: AuthService,
        db: Arc<MemoryDatabase>,
        sessions: Arc<MemorySessionStore>,
        changelog: Arc<ChangelogService>,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(MemoryDatabase::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let changelog = Arc::new(ChangelogService::new(Arc::new(MemoryChangelogStore::new())));
        let service = AuthService::new(
            db.clone(),
            Arc::new(JwtService::new(b"test-secret")),
            sessions.clone(),
            changelog.clone(),
        )
        .with_token_ttl(3600);
        Fixture {
            service,
            db,
            sessions,
            changelog,
        }
    }

    async fn account(db: &MemoryDatabase, username: &str, role: Role, password: &str) -> User {
        UserStore::create(db, CreateUserDto {
            name: format!("{} Example", username),
            email: format!("{}@example.com", username),
            username: username.into(),
            role,
            employee_number: None,
            position: None,
            avatar: None,
            hashed_password: Some(hash_password(password).unwrap()),
            must_change_password: false,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let f = fixture();
        account(&f.db, "alice", Role::User, "secret123").await;

        let by_name = f.service.login("alice", "secret123").await.unwrap();
        assert_eq!(by_name.user.username, "alice");
        assert!(!by_name.token.is_empty());

        let by_email = f.service.login("ALICE@example.com", "secret123").await.unwrap();
        assert_eq!(by_email.user.id, by_name.user.id);

        assert_eq!(f.sessions.len(), 2);
        let recent = f.changelog.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|e| e.action == ChangelogAction::Login));
    }

    #[tokio::test]
    async fn test_login_failures_share_a_message() {
        let f = fixture();
        account(&f.db, "bob", Role::User, "secret123").await;

        let wrong = f.service.login("bob", "nope").await.unwrap_err();
        let unknown = f.service.login("nobody", "secret123").await.unwrap_err();

        assert_eq!(wrong.status_code(), 401);
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(f.changelog.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let f = fixture();
        account(&f.db, "carol", Role::User, "secret123").await;
        let login = f.service.login("carol", "secret123").await.unwrap();

        let mut current = CurrentUser::from(&login.user);
        current.session_id = Some(login.session_id.clone());
        f.service.logout(&current).await.unwrap();

        assert!(f.sessions.is_empty());
        let recent = f.changelog.recent(1).await.unwrap();
        assert_eq!(recent[0].action, ChangelogAction::Logout);
    }

    #[tokio::test]
    async fn test_change_password() {
        let f = fixture();
        let user = account(&f.db, "dave", Role::User, "secret123").await;
        let current = CurrentUser::from(&user);

        let rejected = f
            .service
            .change_password(&current, "wrong", "x")
            .await
            .unwrap();
        assert!(rejected.is_failure());
        assert!(rejected.errors().has_error("currentPassword"));
        assert!(rejected.errors().has_error("password"));

        let changed = f
            .service
            .change_password(&current, "secret123", "better-pass-42")
            .await
            .unwrap();
        assert!(changed.is_success());
        assert!(f.service.login("dave", "better-pass-42").await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_password_rules() {
        let f = fixture();
        let admin = CurrentUser::from(&account(&f.db, "erin", Role::Admin, "secret123").await);
        let user = account(&f.db, "frank", Role::User, "secret123").await;
        let superadmin = account(&f.db, "grace", Role::Superadmin, "secret123").await;
        f.service.login("frank", "secret123").await.unwrap();

        let reset = f.service.reset_password(&admin, user.id).await.unwrap();
        assert_eq!(reset.revoked_sessions, 1);
        assert!(f
            .service
            .login("frank", &reset.temporary_password)
            .await
            .unwrap()
            .user
            .must_change_password);

        let err = f.service.reset_password(&admin, superadmin.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let plain = CurrentUser::from(&user);
        let err = f.service.reset_password(&plain, superadmin.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
