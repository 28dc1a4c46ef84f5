//! The authenticated user and its capability checks

use cm_contracts::UserContext;
use cm_core::traits::Id;
use cm_models::{Capability, Contact, ContactAction, Role, User};
use serde::Serialize;

use crate::jwt::{Claims, JwtError};

/// Current user with role-derived capabilities
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Token id of the session this user authenticated with
    #[serde(skip)]
    pub session_id: Option<String>,
}

impl CurrentUser {
    pub fn new(id: Id, username: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            name: String::new(),
            email: email.into(),
            role,
            session_id: None,
        }
    }

    pub fn from_claims(claims: &Claims) -> Result<Self, JwtError> {
        Ok(Self {
            id: claims.user_id()?,
            username: claims.username.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            role: claims.role,
            session_id: Some(claims.jti.clone()),
        })
    }

    /// Display name, falling back to the username
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.username
        } else {
            &self.name
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.has_capability(capability)
    }

    pub fn can_edit_contact(&self, contact: &Contact) -> bool {
        let action = if contact.is_owned_by(self.id) {
            ContactAction::EditOwn
        } else {
            ContactAction::EditOther
        };
        self.role.permits(action)
    }

    pub fn can_delete_contact(&self) -> bool {
        self.role.permits(ContactAction::Delete)
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        self.role.capabilities()
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            session_id: None,
        }
    }
}

impl UserContext for CurrentUser {
    fn id(&self) -> Id {
        self.id
    }

    fn role(&self) -> Role {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn contact(owner_id: Id) -> Contact {
        Contact {
            id: 1,
            first_name: "A".into(),
            middle_name: None,
            last_name: "B".into(),
            birthday: None,
            phone: None,
            company: None,
            owner_id,
            owner_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            pending_sync: false,
        }
    }

    #[test]
    fn test_contact_actions_by_role() {
        let own = contact(7);
        let other = contact(8);

        let user = CurrentUser::new(7, "u", "u@example.com", Role::User);
        assert!(user.can_edit_contact(&own));
        assert!(!user.can_edit_contact(&other));
        assert!(!user.can_delete_contact());

        let admin = CurrentUser::new(7, "a", "a@example.com", Role::Admin);
        assert!(admin.can_edit_contact(&other));
        assert!(!admin.can_delete_contact());

        let superadmin = CurrentUser::new(7, "s", "s@example.com", Role::Superadmin);
        assert!(superadmin.can_edit_contact(&other));
        assert!(superadmin.can_delete_contact());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut user = CurrentUser::new(1, "jdoe", "j@example.com", Role::User);
        assert_eq!(user.display_name(), "jdoe");
        user.name = "John Doe".into();
        assert_eq!(user.display_name(), "John Doe");
    }

    #[test]
    fn test_user_context_impl() {
        let user = CurrentUser::new(3, "jdoe", "j@example.com", Role::Admin);
        assert_eq!(UserContext::id(&user), 3);
        assert!(UserContext::can(&user, Capability::ManageUsers));
    }
}
