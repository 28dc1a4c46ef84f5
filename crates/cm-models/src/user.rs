//! User model
//!
//! Table: users

use chrono::{DateTime, Utc};
use cm_core::traits::{Entity, Id, Identifiable, Timestamped};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Account role. Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Admin or superadmin
    pub fn is_admin(&self) -> bool {
        *self >= Role::Admin
    }

    pub fn is_superadmin(&self) -> bool {
        *self == Role::Superadmin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// User entity
///
/// An account that can log in, own contacts and appear as a changelog actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,

    /// Display name
    pub name: String,

    /// Email address (unique)
    pub email: String,

    /// Login name (unique)
    pub username: String,

    pub role: Role,

    pub employee_number: Option<String>,

    pub position: Option<String>,

    /// Avatar URL or data URI
    pub avatar: Option<String>,

    #[serde(skip_serializing, default)]
    pub hashed_password: Option<String>,

    /// Set after an administrative password reset
    #[serde(default)]
    pub must_change_password: bool,

    pub last_login_on: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identifiable for User {
    fn id(&self) -> Option<Id> {
        Some(self.id)
    }
}

impl Timestamped for User {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }
}

impl Entity for User {
    const TABLE_NAME: &'static str = "users";
    const TYPE_NAME: &'static str = "User";
}

impl User {
    /// Up to two uppercase initials taken from the display name
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_superadmin(&self) -> bool {
        self.role.is_superadmin()
    }
}

/// New user creation parameters
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    /// Generated from the name when absent
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,

    pub role: Option<Role>,

    #[validate(length(max = 50))]
    pub employee_number: Option<String>,

    #[validate(length(max = 255))]
    pub position: Option<String>,

    pub avatar: Option<String>,

    /// A temporary password is generated when absent
    pub password: Option<String>,
}

/// User update parameters
#[derive(Debug, Clone, Deserialize, Default, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,
    pub role: Option<Role>,
    pub employee_number: Option<String>,
    pub position: Option<String>,
    pub avatar: Option<String>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.username.is_none()
            && self.role.is_none()
            && self.employee_number.is_none()
            && self.position.is_none()
            && self.avatar.is_none()
    }

    /// Apply the present fields to `user`
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(employee_number) = &self.employee_number {
            user.employee_number = Some(employee_number.clone());
        }
        if let Some(position) = &self.position {
            user.position = Some(position.clone());
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = Some(avatar.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: Id, role: Role) -> User {
        User {
            id,
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            username: "alovelace".into(),
            role,
            employee_number: None,
            position: None,
            avatar: None,
            hashed_password: Some("$argon2id$secret".into()),
            must_change_password: false,
            last_login_on: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" superadmin ".parse::<Role>(), Ok(Role::Superadmin));
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::Superadmin.to_string(), "superadmin");
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::User < Role::Admin);
        assert!(Role::Admin.is_admin());
        assert!(!Role::Admin.is_superadmin());
        assert!(!Role::User.is_admin());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(user(1, Role::User)).unwrap();
        assert!(json.get("hashedPassword").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["username"], "alovelace");
    }

    #[test]
    fn test_initials() {
        assert_eq!(user(1, Role::User).initials(), "AL");
    }

    #[test]
    fn test_update_apply() {
        let mut u = user(1, Role::User);
        let update = UpdateUser {
            position: Some("Engineer".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        update.apply_to(&mut u);
        assert_eq!(u.position.as_deref(), Some("Engineer"));
        assert_eq!(u.name, "Ada Lovelace");
    }
}
