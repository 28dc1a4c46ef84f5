//! Create contract for users

use cm_core::error::ValidationErrors;
use cm_models::{Capability, Role};

use super::base::{UserBaseContract, UserData};
use crate::base::{require_capability, Contract, UserContext, ValidationResult};

/// Contract for creating a new user
pub struct CreateUserContract<'a, U: UserContext> {
    base: UserBaseContract<'a, U>,
    user: &'a U,
}

impl<'a, U: UserContext> CreateUserContract<'a, U> {
    pub fn new(user: &'a U) -> Self {
        Self {
            base: UserBaseContract::new(user),
            user,
        }
    }

    fn validate_role_assignment(&self, role: Role, errors: &mut ValidationErrors) {
        if role == Role::Superadmin && !self.user.can(Capability::AssignSuperadmin) {
            errors.add("role", "can only be granted by a superadmin");
        }
    }
}

impl<'a, U: UserContext, T: UserData> Contract<T> for CreateUserContract<'a, U> {
    fn validate(&self, entity: &T) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        require_capability(
            self.user,
            Capability::ManageUsers,
            "Only administrators can create users",
            &mut errors,
        );

        if let Err(base_errors) = self.base.validate(entity) {
            errors.merge(base_errors);
        }
        self.base
            .validate_username_not_reserved(entity.username(), &mut errors);
        self.validate_role_assignment(entity.role(), &mut errors);

        errors.into_result()
    }

    fn is_writable(&self, attribute: &str) -> bool {
        matches!(
            attribute,
            "name" | "email" | "username" | "role" | "employeeNumber" | "position" | "avatar"
                | "password"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::test_support::MockUserContext;
    use crate::users::base::fixtures::MockUser;

    #[test]
    fn test_admin_can_create() {
        let ctx = MockUserContext::admin(1);
        let contract = CreateUserContract::new(&ctx);
        assert!(contract.validate(&MockUser::new("newuser", Role::Admin)).is_ok());
    }

    #[test]
    fn test_user_cannot_create() {
        let ctx = MockUserContext::user(1);
        let contract = CreateUserContract::new(&ctx);
        let errors = contract
            .validate(&MockUser::new("newuser", Role::User))
            .unwrap_err();
        assert_eq!(errors.base_errors.len(), 1);
    }

    #[test]
    fn test_only_superadmin_grants_superadmin() {
        let ctx = MockUserContext::admin(1);
        let contract = CreateUserContract::new(&ctx);
        let errors = contract
            .validate(&MockUser::new("boss", Role::Superadmin))
            .unwrap_err();
        assert!(errors.has_error("role"));

        let ctx = MockUserContext::superadmin(1);
        let contract = CreateUserContract::new(&ctx);
        assert!(contract
            .validate(&MockUser::new("boss", Role::Superadmin))
            .is_ok());
    }

    #[test]
    fn test_reserved_username_rejected() {
        let ctx = MockUserContext::superadmin(1);
        let contract = CreateUserContract::new(&ctx);
        let errors = contract
            .validate(&MockUser::new("root", Role::User))
            .unwrap_err();
        assert!(errors.has_error("username"));
    }
}
