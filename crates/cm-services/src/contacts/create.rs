//! Create Service for Contacts

use cm_auth::CurrentUser;
use cm_changelog::ChangelogBuilder;
use cm_contracts::contacts::CreateContactContract;
use cm_contracts::{validate_input, Contract};
use cm_core::error::ValidationErrors;
use cm_core::{CmError, CmResult};
use cm_models::{Capability, ChangelogAction, Contact, NewContact};
use tracing::{info, warn};

use super::ContactService;
use crate::result::ServiceResult;

/// Message attached to a contact accepted while the database is down
pub const PENDING_SYNC_MESSAGE: &str =
    "The database is unreachable; the contact was saved locally and will sync later";

/// Service for creating contacts
///
/// New contacts are owned by their creator. When the database is
/// unreachable the contact is queued and an optimistic copy marked
/// `pending_sync` is returned instead.
pub struct CreateContactService<'a> {
    service: &'a ContactService,
    user: &'a CurrentUser,
}

impl<'a> CreateContactService<'a> {
    pub fn new(service: &'a ContactService, user: &'a CurrentUser) -> Self {
        Self { service, user }
    }

    pub async fn call(self, params: NewContact) -> CmResult<ServiceResult<Contact>> {
        if !self.user.can(Capability::CreateContact) {
            return Err(CmError::forbidden("You are not allowed to create contacts"));
        }

        let mut errors = ValidationErrors::new();
        if let Err(input_errors) = validate_input(&params) {
            errors.merge(input_errors);
        }
        let candidate = params.clone().into_contact(
            0,
            self.user.id,
            Some(self.user.display_name().to_string()),
        );
        if let Err(contract_errors) = CreateContactContract::new(self.user).validate(&candidate) {
            errors.merge(contract_errors);
        }
        if !errors.is_empty() {
            return Ok(ServiceResult::failure(errors));
        }

        let created = match self.service.contacts.create(self.user.id, &params).await {
            Ok(created) => created,
            Err(e) if e.is_unavailable() => return self.queue(params, e.to_string()).await,
            Err(e) if e.is_conflict() => {
                return Ok(ServiceResult::failure_with_base_error(e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let entry = ChangelogBuilder::contact(ChangelogAction::Create, &created)
            .actor(self.user.id, self.user.display_name())
            .build();
        self.service.changelog.record_logged(entry).await;
        self.service.cache.invalidate_contacts().await;

        info!(contact_id = created.id, owner_id = created.owner_id, "Contact created");
        Ok(ServiceResult::success(created))
    }

    async fn queue(self, params: NewContact, reason: String) -> CmResult<ServiceResult<Contact>> {
        warn!(user_id = self.user.id, reason = %reason, "Database unreachable, queueing contact");

        let operation = self
            .service
            .pending
            .enqueue(self.user.id, self.user.display_name(), params)
            .await
            .map_err(|e| CmError::Unavailable {
                message: format!("{}; local queue failed: {}", reason, e),
            })?;

        Ok(ServiceResult::success(operation.optimistic_contact()).with_message(PENDING_SYNC_MESSAGE))
    }
}
