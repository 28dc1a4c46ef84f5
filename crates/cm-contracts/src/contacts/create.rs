//! Create contract for contacts

use chrono::NaiveDate;
use cm_core::error::ValidationErrors;
use cm_models::{Capability, Contact};

use super::base::ContactBaseContract;
use crate::base::{require_capability, Contract, UserContext, ValidationResult};

/// Contract for creating a new contact
pub struct CreateContactContract<'a, U: UserContext> {
    base: ContactBaseContract<'a, U>,
    user: &'a U,
}

impl<'a, U: UserContext> CreateContactContract<'a, U> {
    pub fn new(user: &'a U) -> Self {
        Self {
            base: ContactBaseContract::new(user),
            user,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.base = self.base.with_today(today);
        self
    }
}

impl<'a, U: UserContext> Contract<Contact> for CreateContactContract<'a, U> {
    fn validate(&self, contact: &Contact) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        require_capability(
            self.user,
            Capability::CreateContact,
            "You are not allowed to create contacts",
            &mut errors,
        );

        // New contacts are always owned by their creator
        if contact.owner_id != self.user.id() {
            errors.add("ownerId", "must be the current user");
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
