//! Delete contract for users

use cm_core::error::ValidationErrors;
use cm_core::traits::Id;
use cm_models::Capability;

use crate::base::{require_capability, Contract, UserContext, ValidationResult};

/// Contract for deleting a user
pub struct DeleteUserContract<'a, U: UserContext> {
    user: &'a U,
}

impl<'a, U: UserContext> DeleteUserContract<'a, U> {
    pub fn new(user: &'a U) -> Self {
        Self { user }
    }
}

/// Data needed for delete validation
pub struct DeleteUserData {
    pub id: Id,
    /// Contacts still owned by the account
    pub owned_contacts: usize,
}

impl<'a, U: UserContext> Contract<DeleteUserData> for DeleteUserContract<'a, U> {
    fn validate(&self, entity: &DeleteUserData) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        require_capability(
            self.user,
            Capability::DeleteUser,
            "Only superadmins can delete users",
            &mut errors,
        );

        if self.user.id() == entity.id {
            errors.add_base("You cannot delete your own account");
        }

        if entity.owned_contacts > 0 {
            errors.add_base(format!(
                "User still owns {} contact(s)",
                entity.owned_contacts
            ));
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

    fn data(id: Id) -> DeleteUserData {
        DeleteUserData {
            id,
            owned_contacts: 0,
        }
    }

    #[test]
    fn test_superadmin_can_delete() {
        let ctx = MockUserContext::superadmin(1);
        assert!(DeleteUserContract::new(&ctx).validate(&data(2)).is_ok());
    }

    #[test]
    fn test_admin_cannot_delete() {
        let ctx = MockUserContext::admin(1);
        assert!(DeleteUserContract::new(&ctx).validate(&data(2)).is_err());
    }

    #[test]
    fn test_cannot_delete_self() {
        let ctx = MockUserContext::superadmin(1);
        let errors = DeleteUserContract::new(&ctx).validate(&data(1)).unwrap_err();
        assert!(errors
            .base_errors
            .iter()
            .any(|e| e.contains("your own account")));
    }

    #[test]
    fn test_cannot_delete_owner_of_contacts() {
        let ctx = MockUserContext::superadmin(1);
        let target = DeleteUserData {
            id: 2,
            owned_contacts: 3,
        };
        assert!(DeleteUserContract::new(&ctx).validate(&target).is_err());
    }
}
