//! Update contract for users
//!
//! Everyone may edit their own profile but not their own role. Editing
//! other accounts requires user management, and only superadmins may
//! touch superadmin accounts or grant the superadmin role.

use cm_core::error::ValidationErrors;
use cm_core::traits::Id;
use cm_models::{Capability, Role};

use super::base::{UserBaseContract, UserData};
use crate::base::{Contract, UserContext, ValidationResult};

/// Contract for updating an existing user
pub struct UpdateUserContract<'a, U: UserContext> {
    base: UserBaseContract<'a, U>,
    user: &'a U,
    target_id: Id,
    original_role: Role,
    original_username: String,
}

impl<'a, U: UserContext> UpdateUserContract<'a, U> {
    pub fn new<T: UserData>(user: &'a U, original: &T) -> Self {
        Self {
            base: UserBaseContract::new(user),
            user,
            target_id: original.id().unwrap_or_default(),
            original_role: original.role(),
            original_username: original.username().to_string(),
        }
    }

    fn is_self(&self) -> bool {
        self.user.id() == self.target_id
    }

    fn validate_user_allowed_to_edit(&self, errors: &mut ValidationErrors) {
        if self.is_self() {
            return;
        }

        if !self.user.can(Capability::ManageUsers) {
            errors.add_base("You are not allowed to edit other users");
        } else if self.original_role == Role::Superadmin
            && !self.user.can(Capability::AssignSuperadmin)
        {
            errors.add_base("Only superadmins can edit superadmin accounts");
        }
    }

    fn validate_role_change(&self, role: Role, errors: &mut ValidationErrors) {
        if role == self.original_role {
            return;
        }

        if self.is_self() {
            errors.add("role", "can't be changed on your own account");
        } else if role == Role::Superadmin && !self.user.can(Capability::AssignSuperadmin) {
            errors.add("role", "can only be granted by a superadmin");
        }
    }
}

impl<'a, U: UserContext, T: UserData> Contract<T> for UpdateUserContract<'a, U> {
    fn validate(&self, entity: &T) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        self.validate_user_allowed_to_edit(&mut errors);
        self.validate_role_change(entity.role(), &mut errors);

        if let Err(base_errors) = self.base.validate(entity) {
            errors.merge(base_errors);
        }
        if entity.username() != self.original_username {
            self.base
                .validate_username_not_reserved(entity.username(), &mut errors);
        }

        errors.into_result()
    }

    fn is_writable(&self, attribute: &str) -> bool {
        match attribute {
            "role" => !self.is_self(),
            "name" | "email" | "username" | "employeeNumber" | "position" | "avatar" => true,
            _ => false,
        }
    }
}
