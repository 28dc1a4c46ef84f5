//! User representers

use cm_auth::CurrentUser;
use cm_models::{Capability, User};
use serde::Serialize;

/// What the current user may do with one user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActions {
    pub edit: bool,
    pub delete: bool,
    pub reset_password: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRepresentation {
    #[serde(flatten)]
    pub user: User,
    pub actions: UserActions,
}

impl UserRepresentation {
    pub fn represent(user: User, current: &CurrentUser) -> Self {
        let manage = current.can(Capability::ManageUsers);
        let is_self = user.id == current.id;
        Self {
            actions: UserActions {
                edit: manage || is_self,
                delete: !is_self && current.can(Capability::DeleteUser),
                reset_password: !is_self && manage,
            },
            user,
        }
    }
}

/// The signed-in user with the capabilities of their role
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeRepresentation {
    #[serde(flatten)]
    pub user: CurrentUser,
    pub display_name: String,
    pub capabilities: Vec<Capability>,
}

impl MeRepresentation {
    pub fn represent(user: CurrentUser) -> Self {
        Self {
            display_name: user.display_name().to_string(),
            capabilities: user.capabilities().to_vec(),
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_models::Role;

    #[test]
    fn test_me_lists_capabilities() {
        let me = MeRepresentation::represent(CurrentUser::new(1, "una", "una@example.com", Role::User));
        let json = serde_json::to_value(&me).unwrap();
        assert_eq!(json["username"], "una");
        assert_eq!(json["displayName"], "una");
        let capabilities = json["capabilities"].as_array().unwrap();
        assert!(capabilities.contains(&serde_json::json!("view_contacts")));
        assert!(!capabilities.contains(&serde_json::json!("view_changelog")));
    }
}
