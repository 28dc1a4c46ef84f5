//! Delete contract for contacts

use cm_core::error::ValidationErrors;
use cm_models::{Contact, ContactAction};

use crate::base::{Contract, UserContext, ValidationResult};

/// Contract for deleting a contact. Only superadmins may delete.
pub struct DeleteContactContract<'a, U: UserContext> {
    user: &'a U,
}

impl<'a, U: UserContext> DeleteContactContract<'a, U> {
    pub fn new(user: &'a U) -> Self {
        Self { user }
    }
}

impl<'a, U: UserContext> Contract<Contact> for DeleteContactContract<'a, U> {
    fn validate(&self, _contact: &Contact) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        if !self.user.role().permits(ContactAction::Delete) {
            errors.add_base("Only superadmins can delete contacts");
        }

        errors.into_result()
    }

    fn is_writable(&self, _attribute: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::test_support::MockUserContext;
    use crate::contacts::base::fixtures::contact;

    #[test]
    fn test_only_superadmin_can_delete() {
        let own = contact(1);

        let ctx = MockUserContext::user(1);
        assert!(DeleteContactContract::new(&ctx).validate(&own).is_err());

        let ctx = MockUserContext::admin(1);
        assert!(DeleteContactContract::new(&ctx).validate(&own).is_err());

        let ctx = MockUserContext::superadmin(5);
        assert!(DeleteContactContract::new(&ctx).validate(&own).is_ok());
    }
}
