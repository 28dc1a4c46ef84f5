//! Role capabilities
//!
//! Permissions are a static lookup table from [`Role`] to the set of
//! [`Capability`] values it grants. Nothing else in the workspace compares
//! roles directly when deciding what a user may do.

use serde::{Deserialize, Serialize};

use crate::user::Role;

/// A single grantable permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewContacts,
    CreateContact,
    EditOwnContact,
    EditAnyContact,
    DeleteContact,
    ExportContacts,
    ViewUsers,
    ManageUsers,
    AssignSuperadmin,
    DeleteUser,
    ViewChangelog,
    ExportChangelog,
    ViewDiagnostics,
}

const USER_CAPABILITIES: &[Capability] = &[
    Capability::ViewContacts,
    Capability::CreateContact,
    Capability::EditOwnContact,
    Capability::ExportContacts,
    Capability::ViewUsers,
];

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::ViewContacts,
    Capability::CreateContact,
    Capability::EditOwnContact,
    Capability::EditAnyContact,
    Capability::ExportContacts,
    Capability::ViewUsers,
    Capability::ManageUsers,
    Capability::ViewChangelog,
    Capability::ExportChangelog,
];

const SUPERADMIN_CAPABILITIES: &[Capability] = &[
    Capability::ViewContacts,
    Capability::CreateContact,
    Capability::EditOwnContact,
    Capability::EditAnyContact,
    Capability::DeleteContact,
    Capability::ExportContacts,
    Capability::ViewUsers,
    Capability::ManageUsers,
    Capability::AssignSuperadmin,
    Capability::DeleteUser,
    Capability::ViewChangelog,
    Capability::ExportChangelog,
    Capability::ViewDiagnostics,
];

/// Per-contact actions shown next to each row of the contact list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactAction {
    EditOwn,
    EditOther,
    Delete,
}

impl ContactAction {
    pub fn required_capability(&self) -> Capability {
        match self {
            ContactAction::EditOwn => Capability::EditOwnContact,
            ContactAction::EditOther => Capability::EditAnyContact,
            ContactAction::Delete => Capability::DeleteContact,
        }
    }
}

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::User => USER_CAPABILITIES,
            Role::Admin => ADMIN_CAPABILITIES,
            Role::Superadmin => SUPERADMIN_CAPABILITIES,
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    pub fn permits(&self, action: ContactAction) -> bool {
        self.has_capability(action.required_capability())
    }
}
