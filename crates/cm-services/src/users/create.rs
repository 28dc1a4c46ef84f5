//! Create Service for Users

use cm_auth::{generate_temporary_password, hash_password, CurrentUser};
use cm_changelog::ChangelogBuilder;
use cm_contracts::users::CreateUserContract;
use cm_contracts::{validate_input, Contract};
use cm_core::error::ValidationErrors;
use cm_core::{CmError, CmResult};
use cm_db::CreateUserDto;
use cm_models::{Capability, ChangelogAction, NewUser, Role, User};
use serde::Serialize;
use tracing::info;

use super::{UserDraft, UserService};
use crate::result::ServiceResult;

/// A new account and, when one was generated, its temporary password
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

/// Service for creating users
///
/// # Example
/// ```ignore
/// let created = CreateUserService::new(&users, &admin)
///     .call(NewUser { name: "Jane Doe".into(), email: "jane@example.com".into(), .. })
///     .await?;
/// ```
pub struct CreateUserService<'a> {
    service: &'a UserService,
    user: &'a CurrentUser,
}

impl<'a> CreateUserService<'a> {
    pub fn new(service: &'a UserService, user: &'a CurrentUser) -> Self {
        Self { service, user }
    }

    pub async fn call(self, params: NewUser) -> CmResult<ServiceResult<CreatedUser>> {
        if !self.user.can(Capability::ManageUsers) {
            return Err(CmError::forbidden("Only administrators can create users"));
        }

        let name = params.name.trim().to_string();
        let email = params.email.trim().to_string();
        let username = match params
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            Some(username) => username.to_string(),
            None if name.is_empty() => String::new(),
            None => self.service.generate_username(&name).await?,
        };
        let role = params.role.unwrap_or(Role::User);

        let mut errors = ValidationErrors::new();
        if let Err(input_errors) = validate_input(&params) {
            errors.merge(input_errors);
        }

        let draft = UserDraft {
            name: &name,
            email: &email,
            username: &username,
            role,
            employee_number: params.employee_number.as_deref(),
        };
        if let Err(contract_errors) = CreateUserContract::new(self.user).validate(&draft) {
            errors.merge(contract_errors);
        }

        if !username.is_empty() && self.service.users.username_exists(&username).await? {
            errors.add("username", "has already been taken");
        }
        if !email.is_empty() && self.service.users.find_by_email(&email).await?.is_some() {
            errors.add("email", "has already been taken");
        }

        if let Some(password) = &params.password {
            for message in self.service.policy.violations(password) {
                errors.add("password", message);
            }
        }

        if !errors.is_empty() {
            return Ok(ServiceResult::failure(errors));
        }

        let (password, temporary_password) = match params.password {
            Some(password) => (password, None),
            None => {
                let generated = generate_temporary_password();
                (generated.clone(), Some(generated))
            }
        };
        let hashed = hash_password(&password).map_err(|e| CmError::Internal(e.to_string()))?;

        let dto = CreateUserDto {
            name,
            email,
            username,
            role,
            employee_number: params.employee_number,
            position: params.position,
            avatar: params.avatar,
            hashed_password: Some(hashed),
            must_change_password: temporary_password.is_some(),
        };
        let created = match self.service.users.create(dto).await {
            Ok(created) => created,
            // Lost a race with another insert
            Err(e) if e.is_conflict() => {
                return Ok(ServiceResult::failure_with_base_error(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let entry = ChangelogBuilder::user(ChangelogAction::Create, &created)
            .actor(self.user.id, self.user.display_name())
            .detail("role", created.role.as_str())
            .build();
        self.service.changelog.record_logged(entry).await;
        self.service.after_write().await;

        info!(
            user_id = created.id,
            username = %created.username,
            created_by = self.user.id,
            "User created"
        );
        Ok(ServiceResult::success(CreatedUser {
            user: created,
            temporary_password,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use cm_auth::verify_password;

    fn params(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            username: None,
            role: None,
            employee_number: None,
            position: None,
            avatar: None,
            password: None,
        }
    }

    #[tokio::test]
    async fn test_create_generates_username_and_password() {
        let f = fixture();
        let admin = account(&f.db, "Ada Admin", "ada", Role::Admin).await;

        let result = f
            .service
            .create(&admin, params("Jane Doe", "jane@example.com"))
            .await
            .unwrap();
        assert!(result.is_success());

        let created = result.result().unwrap();
        assert_eq!(created.user.username, "jdoe");
        assert_eq!(created.user.role, Role::User);
        assert!(created.user.must_change_password);

        let temporary = created.temporary_password.as_deref().unwrap();
        let stored = f.service.get(&admin, created.user.id).await.unwrap();
        assert!(verify_password(temporary, stored.hashed_password.as_deref().unwrap()));

        let recent = f.changelog.recent(1).await.unwrap();
        assert_eq!(recent[0].action, ChangelogAction::Create);
        assert_eq!(recent[0].entity_id, Some(created.user.id));
    }

    #[tokio::test]
    async fn test_create_with_explicit_password() {
        let f = fixture();
        let admin = account(&f.db, "Ada Admin", "ada", Role::Admin).await;

        let mut p = params("John Roe", "john@example.com");
        p.username = Some("johnny".into());
        p.password = Some("long-enough-1".into());

        let result = f.service.create(&admin, p).await.unwrap();
        let created = result.result().unwrap();
        assert_eq!(created.user.username, "johnny");
        assert!(created.temporary_password.is_none());
        assert!(!created.user.must_change_password);
    }

    #[tokio::test]
    async fn test_create_requires_manage_users() {
        let f = fixture();
        let user = account(&f.db, "Una User", "una", Role::User).await;

        let err = f
            .service
            .create(&user, params("Jane Doe", "jane@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_duplicates_and_role_rules() {
        let f = fixture();
        let admin = account(&f.db, "Ada Admin", "ada", Role::Admin).await;

        let mut p = params("Other Ada", "ada@example.com");
        p.username = Some("ada".into());
        p.role = Some(Role::Superadmin);

        let result = f.service.create(&admin, p).await.unwrap();
        assert!(result.is_failure());
        assert!(result.errors().has_error("username"));
        assert!(result.errors().has_error("email"));
        assert!(result.errors().has_error("role"));
    }
}
