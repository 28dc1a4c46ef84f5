//! Delete Service for Contacts

use cm_auth::CurrentUser;
use cm_changelog::ChangelogBuilder;
use cm_contracts::contacts::DeleteContactContract;
use cm_contracts::Contract;
use cm_core::traits::Id;
use cm_core::{CmError, CmResult};
use cm_models::{ChangelogAction, Contact};
use tracing::info;

use super::ContactService;
use crate::result::ServiceResult;

/// Service for deleting contacts; superadmins only
pub struct DeleteContactService<'a> {
    service: &'a ContactService,
    user: &'a CurrentUser,
}

impl<'a> DeleteContactService<'a> {
    pub fn new(service: &'a ContactService, user: &'a CurrentUser) -> Self {
        Self { service, user }
    }

    pub async fn call(self, id: Id) -> CmResult<ServiceResult<Contact>> {
        if !self.user.can_delete_contact() {
            return Err(CmError::forbidden("Only superadmins can delete contacts"));
        }

        let contact = self
            .service
            .contacts
            .find_by_id(id)
            .await?
            .ok_or_else(|| CmError::not_found("Contact", id))?;

        if let Err(errors) = DeleteContactContract::new(self.user).validate(&contact) {
            return Ok(ServiceResult::failure(errors));
        }

        self.service.contacts.delete(id).await?;

        let entry = ChangelogBuilder::contact(ChangelogAction::Delete, &contact)
            .actor(self.user.id, self.user.display_name())
            .build();
        self.service.changelog.record_logged(entry).await;
        self.service.cache.invalidate_contacts().await;

        info!(contact_id = id, deleted_by = self.user.id, "Contact deleted");
        Ok(ServiceResult::success(contact))
    }
}
