//! Delete Service for Users

use cm_auth::CurrentUser;
use cm_changelog::ChangelogBuilder;
use cm_contracts::users::{DeleteUserContract, DeleteUserData};
use cm_contracts::Contract;
use cm_core::traits::Id;
use cm_core::{CmError, CmResult};
use cm_models::{Capability, ChangelogAction, User};
use tracing::info;

use super::UserService;
use crate::result::ServiceResult;

/// Service for deleting users
///
/// Accounts that still own contacts are kept; their contacts have to be
/// removed first.
pub struct DeleteUserService<'a> {
    service: &'a UserService,
    user: &'a CurrentUser,
}

impl<'a> DeleteUserService<'a> {
    pub fn new(service: &'a UserService, user: &'a CurrentUser) -> Self {
        Self { service, user }
    }

    pub async fn call(self, id: Id) -> CmResult<ServiceResult<User>> {
        if !self.user.can(Capability::DeleteUser) {
            return Err(CmError::forbidden("Only superadmins can delete users"));
        }

        let target = self
            .service
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| CmError::not_found("User", id))?;

        let data = DeleteUserData {
            id,
            owned_contacts: self.service.contacts.count_by_owner(id).await?,
        };
        if let Err(errors) = DeleteUserContract::new(self.user).validate(&data) {
            return Ok(ServiceResult::failure(errors));
        }

        self.service.users.delete(id).await?;
        self.service.revoke_sessions(id);

        let entry = ChangelogBuilder::user(ChangelogAction::Delete, &target)
            .actor(self.user.id, self.user.display_name())
            .detail("email", &target.email)
            .build();
        self.service.changelog.record_logged(entry).await;
        self.service.after_write().await;

        info!(user_id = id, deleted_by = self.user.id, "User deleted");
        Ok(ServiceResult::success(target))
    }
}
