//! Base contract for users

use cm_core::error::ValidationErrors;
use cm_core::traits::Id;
use cm_models::{Role, User};
use regex::Regex;
use std::sync::LazyLock;

use crate::base::{Contract, UserContext, ValidationResult};

/// Valid email pattern
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Lowercase letters, digits, dots, underscores and dashes
static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9._-]{3,50}$").unwrap());

/// Usernames that may not be taken by new or renamed accounts
const RESERVED_USERNAMES: &[&str] = &[
    "admin", "administrator", "superadmin", "root", "system", "anonymous",
    "me", "current", "self",
];

/// User data for validation
pub trait UserData: Send + Sync {
    fn id(&self) -> Option<Id>;
    fn name(&self) -> &str;
    fn email(&self) -> &str;
    fn username(&self) -> &str;
    fn role(&self) -> Role;
    fn employee_number(&self) -> Option<&str>;
}

impl UserData for User {
    fn id(&self) -> Option<Id> {
        Some(self.id)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn role(&self) -> Role {
        self.role
    }

    fn employee_number(&self) -> Option<&str> {
        self.employee_number.as_deref()
    }
}

/// Base contract for users with common validations
pub struct UserBaseContract<'a, U: UserContext> {
    user: &'a U,
}

impl<'a, U: UserContext> UserBaseContract<'a, U> {
    pub fn new(user: &'a U) -> Self {
        Self { user }
    }

    pub fn validate_name(&self, name: &str, errors: &mut ValidationErrors) {
        if name.trim().is_empty() {
            errors.add("name", "can't be blank");
        } else if name.chars().count() > 255 {
            errors.add("name", "is too long (maximum is 255 characters)");
        }
    }

    pub fn validate_email(&self, email: &str, errors: &mut ValidationErrors) {
        if email.is_empty() {
            errors.add("email", "can't be blank");
            return;
        }

        if !EMAIL_PATTERN.is_match(email) {
            errors.add("email", "is not a valid email address");
        }
    }

    pub fn validate_username(&self, username: &str, errors: &mut ValidationErrors) {
        if username.is_empty() {
            errors.add("username", "can't be blank");
            return;
        }

        if !USERNAME_PATTERN.is_match(username) {
            errors.add(
                "username",
                "is invalid. Use 3-50 lowercase letters, numbers, dots, underscores or dashes",
            );
        }
    }

    /// Reserved names are only checked for new or renamed accounts
    pub fn validate_username_not_reserved(&self, username: &str, errors: &mut ValidationErrors) {
        if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
            errors.add("username", "is reserved");
        }
    }

    pub fn validate_employee_number(&self, number: Option<&str>, errors: &mut ValidationErrors) {
        if number.is_some_and(|n| n.chars().count() > 50) {
            errors.add("employeeNumber", "is too long (maximum is 50 characters)");
        }
    }

    /// Get the user context
    pub fn user(&self) -> &'a U {
        self.user
    }
}

impl<'a, U: UserContext, T: UserData> Contract<T> for UserBaseContract<'a, U> {
    fn validate(&self, entity: &T) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        self.validate_name(entity.name(), &mut errors);
        self.validate_email(entity.email(), &mut errors);
        self.validate_username(entity.username(), &mut errors);
        self.validate_employee_number(entity.employee_number(), &mut errors);

        errors.into_result()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub struct MockUser {
        pub id: Option<Id>,
        pub name: String,
        pub email: String,
        pub username: String,
        pub role: Role,
    }

    impl MockUser {
        pub fn new(username: &str, role: Role) -> Self {
            Self {
                id: None,
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
                username: username.to_string(),
                role,
            }
        }

        pub fn persisted(id: Id, username: &str, role: Role) -> Self {
            Self {
                id: Some(id),
                ..Self::new(username, role)
            }
        }
    }

    impl UserData for MockUser {
        fn id(&self) -> Option<Id> {
            self.id
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn email(&self) -> &str {
            &self.email
        }
        fn username(&self) -> &str {
            &self.username
        }
        fn role(&self) -> Role {
            self.role
        }
        fn employee_number(&self) -> Option<&str> {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::MockUser;
    use super::*;
    use crate::base::test_support::MockUserContext;

    #[test]
    fn test_valid_user() {
        let ctx = MockUserContext::admin(1);
        let contract = UserBaseContract::new(&ctx);
        assert!(contract.validate(&MockUser::new("jdoe", Role::User)).is_ok());
    }

    #[test]
    fn test_invalid_email() {
        let ctx = MockUserContext::admin(1);
        let contract = UserBaseContract::new(&ctx);

        let mut user = MockUser::new("jdoe", Role::User);
        user.email = "not-an-email".to_string();

        let result = contract.validate(&user);
        assert!(result.unwrap_err().has_error("email"));
    }

    #[test]
    fn test_invalid_username() {
        let ctx = MockUserContext::admin(1);
        let contract = UserBaseContract::new(&ctx);

        for username in ["JDoe", "jd", "john doe"] {
            let result = contract.validate(&MockUser::new(username, Role::User));
            assert!(result.unwrap_err().has_error("username"), "{}", username);
        }
    }

    #[test]
    fn test_reserved_username() {
        let ctx = MockUserContext::admin(1);
        let contract = UserBaseContract::new(&ctx);

        let mut errors = ValidationErrors::new();
        contract.validate_username_not_reserved("Admin", &mut errors);
        assert!(errors.has_error("username"));
    }

    #[test]
    fn test_blank_name() {
        let ctx = MockUserContext::admin(1);
        let contract = UserBaseContract::new(&ctx);

        let mut user = MockUser::new("jdoe", Role::User);
        user.name = "  ".to_string();
        assert!(contract.validate(&user).unwrap_err().has_error("name"));
    }
}
