//! Base contract system

use cm_core::error::ValidationErrors;
use cm_core::traits::Id;
use cm_models::{Capability, Role};

/// Result of contract validation
pub type ValidationResult = Result<(), ValidationErrors>;

/// The acting user, as seen by contracts
pub trait UserContext: Send + Sync {
    fn id(&self) -> Id;
    fn role(&self) -> Role;

    fn can(&self, capability: Capability) -> bool {
        self.role().has_capability(capability)
    }
}

/// Base contract trait
pub trait Contract<T>: Send + Sync {
    /// Validate the entity
    fn validate(&self, entity: &T) -> ValidationResult;

    /// Check if an attribute is writable
    fn is_writable(&self, _attribute: &str) -> bool {
        true
    }
}

/// Add a base error unless the user holds `capability`
pub fn require_capability<U: UserContext + ?Sized>(
    user: &U,
    capability: Capability,
    message: &str,
    errors: &mut ValidationErrors,
) {
    if !user.can(capability) {
        errors.add_base(message);
    }
}

/// Run the `validator` derive rules of an input struct
pub fn validate_input<T: validator::Validate>(input: &T) -> ValidationResult {
    input.validate().map_err(from_validator)
}

/// Convert `validator` errors into attribute-keyed messages
pub fn from_validator(source: validator::ValidationErrors) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for (field, field_errors) in source.field_errors() {
        for error in field_errors {
            let message = match &error.message {
                Some(message) => message.to_string(),
                None => match error.code.as_ref() {
                    "length" => "has an invalid length".to_string(),
                    "email" => "is not a valid email address".to_string(),
                    "required" => "can't be blank".to_string(),
                    _ => "is invalid".to_string(),
                },
            };
            errors.add(field.to_string(), message);
        }
    }
    errors
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub struct MockUserContext {
        pub id: Id,
        pub role: Role,
    }

    impl MockUserContext {
        pub fn user(id: Id) -> Self {
            Self { id, role: Role::User }
        }

        pub fn admin(id: Id) -> Self {
            Self { id, role: Role::Admin }
        }

        pub fn superadmin(id: Id) -> Self {
            Self {
                id,
                role: Role::Superadmin,
            }
        }
    }

    impl UserContext for MockUserContext {
        fn id(&self) -> Id {
            self.id
        }

        fn role(&self) -> Role {
            self.role
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MockUserContext;
    use super::*;
    use cm_models::NewUser;

    #[test]
    fn test_require_capability() {
        let mut errors = ValidationErrors::new();
        require_capability(
            &MockUserContext::user(1),
            Capability::ManageUsers,
            "not allowed",
            &mut errors,
        );
        assert_eq!(errors.base_errors, vec!["not allowed".to_string()]);

        let mut errors = ValidationErrors::new();
        require_capability(
            &MockUserContext::admin(1),
            Capability::ManageUsers,
            "not allowed",
            &mut errors,
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_validate_input_maps_field_errors() {
        let input = NewUser {
            name: String::new(),
            email: "nope".into(),
            username: None,
            role: None,
            employee_number: None,
            position: None,
            avatar: None,
            password: None,
        };

        let errors = validate_input(&input).unwrap_err();
        assert!(errors.has_error("name"));
        assert_eq!(
            errors.get("email"),
            Some(&vec!["is not a valid email address".to_string()])
        );
    }
}
