//! Update Service for Contacts

use cm_auth::CurrentUser;
use cm_changelog::ChangelogBuilder;
use cm_contracts::contacts::UpdateContactContract;
use cm_contracts::{validate_input, Contract};
use cm_core::error::ValidationErrors;
use cm_core::traits::Id;
use cm_core::{CmError, CmResult};
use cm_models::{ChangelogAction, Contact, UpdateContact};
use tracing::info;

use super::ContactService;
use crate::result::ServiceResult;

/// Service for updating contacts
pub struct UpdateContactService<'a> {
    service: &'a ContactService,
    user: &'a CurrentUser,
}

impl<'a> UpdateContactService<'a> {
    pub fn new(service: &'a ContactService, user: &'a CurrentUser) -> Self {
        Self { service, user }
    }

    pub async fn call(self, id: Id, changes: UpdateContact) -> CmResult<ServiceResult<Contact>> {
        let original = self
            .service
            .contacts
            .find_by_id(id)
            .await?
            .ok_or_else(|| CmError::not_found("Contact", id))?;

        if !self.user.can_edit_contact(&original) {
            return Err(CmError::forbidden("You are not allowed to edit this contact"));
        }

        let mut errors = ValidationErrors::new();
        if let Err(input_errors) = validate_input(&changes) {
            errors.merge(input_errors);
        }
        let mut updated = original.clone();
        changes.apply_to(&mut updated);
        if let Err(contract_errors) =
            UpdateContactContract::new(self.user, &original).validate(&updated)
        {
            errors.merge(contract_errors);
        }
        if !errors.is_empty() {
            return Ok(ServiceResult::failure(errors));
        }

        let changed = changes.changed_attributes();
        if changed.is_empty() {
            return Ok(ServiceResult::success(original));
        }

        let saved = self.service.contacts.update(id, &changes).await?;

        let entry = ChangelogBuilder::contact(ChangelogAction::Update, &saved)
            .actor(self.user.id, self.user.display_name())
            .changes(&changed)
            .build();
        self.service.changelog.record_logged(entry).await;
        self.service.cache.invalidate_contacts().await;

        info!(contact_id = id, updated_by = self.user.id, changes = ?changed, "Contact updated");
        Ok(ServiceResult::success(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use cm_models::Role;

    async fn owned_by(f: &Fixture, owner: &CurrentUser) -> Contact {
        f.service
            .create(owner, new_contact("Ada", "Lovelace"))
            .await
            .unwrap()
            .result()
            .unwrap()
            .clone()
    }

    fn rename(company: &str) -> UpdateContact {
        UpdateContact {
            company: Some(company.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_owner_edits_own_contact() {
        let f = fixture();
        let user = account(&f.db, "una", Role::User).await;
        let contact = owned_by(&f, &user).await;

        let result = f.service.update(&user, contact.id, rename("Analytical")).await.unwrap();
        assert_eq!(result.result().unwrap().company.as_deref(), Some("Analytical"));

        let entry = &f.changelog.recent(1).await.unwrap()[0];
        assert_eq!(entry.action, ChangelogAction::Update);
        assert_eq!(entry.details.as_ref().unwrap()["changes"][0], "company");
    }

    #[tokio::test]
    async fn test_edit_matrix() {
        let f = fixture();
        let owner = account(&f.db, "una", Role::User).await;
        let other = account(&f.db, "otto", Role::User).await;
        let admin = account(&f.db, "ada", Role::Admin).await;
        let contact = owned_by(&f, &owner).await;

        let err = f.service.update(&other, contact.id, rename("X")).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let result = f.service.update(&admin, contact.id, rename("Y")).await.unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_missing_contact() {
        let f = fixture();
        let user = account(&f.db, "una", Role::User).await;
        let err = f.service.update(&user, 404, rename("X")).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
