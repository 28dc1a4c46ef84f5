//! Update contract for contacts
//!
//! Users may edit the contacts they own; admins and superadmins may edit any.

use chrono::NaiveDate;
use cm_core::error::ValidationErrors;
use cm_core::traits::Id;
use cm_models::{Contact, ContactAction};

use super::base::ContactBaseContract;
use crate::base::{Contract, UserContext, ValidationResult};

/// Contract for updating an existing contact
pub struct UpdateContactContract<'a, U: UserContext> {
    base: ContactBaseContract<'a, U>,
    user: &'a U,
    original_owner_id: Id,
}

impl<'a, U: UserContext> UpdateContactContract<'a, U> {
    pub fn new(user: &'a U, original: &Contact) -> Self {
        Self {
            base: ContactBaseContract::new(user),
            user,
            original_owner_id: original.owner_id,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.base = self.base.with_today(today);
        self
    }

    /// The action this edit requires from the acting user
    pub fn required_action(&self) -> ContactAction {
        if self.original_owner_id == self.user.id() {
            ContactAction::EditOwn
        } else {
            ContactAction::EditOther
        }
    }
}

impl<'a, U: UserContext> Contract<Contact> for UpdateContactContract<'a, U> {
    fn validate(&self, contact: &Contact) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        if !self.user.role().permits(self.required_action()) {
            errors.add_base("You are not allowed to edit this contact");
        }

        if contact.owner_id != self.original_owner_id {
            errors.add("ownerId", "is not writable");
        }

        if let Err(base_errors) = self.base.validate(contact) {
            errors.merge(base_errors);
        }

        errors.into_result()
    }

    fn is_writable(&self, attribute: &str) -> bool {
        matches!(
            attribute,
            "firstName" | "middleName" | "lastName" | "birthday" | "phone" | "company"
        )
    }
}
