//! Update Service for Users

use cm_auth::CurrentUser;
use cm_changelog::ChangelogBuilder;
use cm_contracts::users::UpdateUserContract;
use cm_contracts::{validate_input, Contract};
use cm_core::error::ValidationErrors;
use cm_core::traits::Id;
use cm_core::{CmError, CmResult};
use cm_models::{Capability, ChangelogAction, UpdateUser, User};
use tracing::info;

use super::UserService;
use crate::result::ServiceResult;

/// Names of the attributes an update actually changes
fn changed_attributes(changes: &UpdateUser, original: &User) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if changes.name.as_ref().is_some_and(|v| v != &original.name) {
        changed.push("name");
    }
    if changes.email.as_ref().is_some_and(|v| v != &original.email) {
        changed.push("email");
    }
    if changes.username.as_ref().is_some_and(|v| v != &original.username) {
        changed.push("username");
    }
    if changes.role.is_some_and(|v| v != original.role) {
        changed.push("role");
    }
    if changes.employee_number.is_some() && changes.employee_number != original.employee_number {
        changed.push("employeeNumber");
    }
    if changes.position.is_some() && changes.position != original.position {
        changed.push("position");
    }
    if changes.avatar.is_some() && changes.avatar != original.avatar {
        changed.push("avatar");
    }
    changed
}

/// Service for updating users
pub struct UpdateUserService<'a> {
    service: &'a UserService,
    user: &'a CurrentUser,
}

impl<'a> UpdateUserService<'a> {
    pub fn new(service: &'a UserService, user: &'a CurrentUser) -> Self {
        Self { service, user }
    }

    pub async fn call(self, id: Id, changes: UpdateUser) -> CmResult<ServiceResult<User>> {
        if id != self.user.id && !self.user.can(Capability::ManageUsers) {
            return Err(CmError::forbidden("You are not allowed to edit other users"));
        }

        let original = self
            .service
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| CmError::not_found("User", id))?;

        let changed = changed_attributes(&changes, &original);
        if changed.is_empty() {
            return Ok(ServiceResult::success(original));
        }

        let mut errors = ValidationErrors::new();
        if let Err(input_errors) = validate_input(&changes) {
            errors.merge(input_errors);
        }

        let mut updated = original.clone();
        changes.apply_to(&mut updated);
        if let Err(contract_errors) = UpdateUserContract::new(self.user, &original).validate(&updated) {
            errors.merge(contract_errors);
        }

        if changed.contains(&"username") {
            if let Some(existing) = self.service.users.find_by_username(&updated.username).await? {
                if existing.id != id {
                    errors.add("username", "has already been taken");
                }
            }
        }
        if changed.contains(&"email") {
            if let Some(existing) = self.service.users.find_by_email(&updated.email).await? {
                if existing.id != id {
                    errors.add("email", "has already been taken");
                }
            }
        }

        if !errors.is_empty() {
            return Ok(ServiceResult::failure(errors));
        }

        let saved = match self.service.users.update(id, &changes).await {
            Ok(saved) => saved,
            Err(e) if e.is_conflict() => {
                return Ok(ServiceResult::failure_with_base_error(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let entry = ChangelogBuilder::user(ChangelogAction::Update, &saved)
            .actor(self.user.id, self.user.display_name())
            .changes(&changed)
            .build();
        self.service.changelog.record_logged(entry).await;
        if changed.contains(&"role") {
            self.service.revoke_sessions(id);
        }
        self.service.after_write().await;

        info!(user_id = id, updated_by = self.user.id, changes = ?changed, "User updated");
        Ok(ServiceResult::success(saved))
    }
}

#[cfg(test)]
mod tests {
    use cm_auth::SessionStore;
    use super::super::test_support::*;
    use super::*;
    use cm_models::Role;

    #[tokio::test]
    async fn test_update_own_profile() {
        let f = fixture();
        let user = account(&f.db, "Una User", "una", Role::User).await;

        let result = f
            .service
            .update(
                &user,
                user.id,
                UpdateUser {
                    position: Some("Engineer".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.result().unwrap().position.as_deref(), Some("Engineer"));
        let entry = &f.changelog.recent(1).await.unwrap()[0];
        assert_eq!(entry.details.as_ref().unwrap()["changes"][0], "position");
    }

    #[tokio::test]
    async fn test_role_change_signs_user_out() {
        let f = fixture();
        let root = account(&f.db, "Sam Super", "sam", Role::Superadmin).await;
        let eve = account(&f.db, "Eve Super", "eve", Role::Superadmin).await;
        signed_in(&f.sessions, &eve, "eve-token");
        signed_in(&f.sessions, &root, "root-token");

        let renamed = f
            .service
            .update(
                &root,
                eve.id,
                UpdateUser {
                    position: Some("Manager".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(renamed.is_success());
        assert!(f.sessions.get("eve-token").is_some());

        let demoted = f
            .service
            .update(
                &root,
                eve.id,
                UpdateUser {
                    role: Some(Role::User),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(demoted.result().unwrap().role, Role::User);
        assert!(f.sessions.get("eve-token").is_none());
        assert!(f.sessions.get("root-token").is_some());
    }

    #[tokio::test]
    async fn test_cannot_change_own_role() {
        let f = fixture();
        let admin = account(&f.db, "Ada Admin", "ada", Role::Admin).await;

        let result = f
            .service
            .update(
                &admin,
                admin.id,
                UpdateUser {
                    role: Some(Role::User),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.errors().has_error("role"));
    }

    #[tokio::test]
    async fn test_user_cannot_edit_others() {
        let f = fixture();
        let user = account(&f.db, "Una User", "una", Role::User).await;
        let other = account(&f.db, "Otto Other", "otto", Role::User).await;

        let err = f
            .service
            .update(
                &user,
                other.id,
                UpdateUser {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_admin_cannot_touch_superadmin() {
        let f = fixture();
        let admin = account(&f.db, "Ada Admin", "ada", Role::Admin).await;
        let root = account(&f.db, "Sam Super", "sam", Role::Superadmin).await;

        let result = f
            .service
            .update(
                &admin,
                root.id,
                UpdateUser {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.is_failure());
        assert!(!result.errors().full_messages().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_update_is_a_no_op() {
        let f = fixture();
        let user = account(&f.db, "Una User", "una", Role::User).await;

        let result = f
            .service
            .update(
                &user,
                user.id,
                UpdateUser {
                    name: Some("Una User".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(f.changelog.count().await.unwrap(), 0);
    }
}
