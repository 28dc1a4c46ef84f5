//! Contact representer

use chrono::{DateTime, Utc};
use cm_auth::CurrentUser;
use cm_models::{Capability, Contact};
use cm_services::{ContactList, SourceKind};
use serde::Serialize;

/// What the current user may do with one contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContactActions {
    pub edit: bool,
    pub delete: bool,
    pub download: bool,
}

impl ContactActions {
    pub fn for_user(user: &CurrentUser, contact: &Contact) -> Self {
        // Optimistic contacts do not exist server-side yet
        let persisted = !contact.pending_sync;
        Self {
            edit: persisted && user.can_edit_contact(contact),
            delete: persisted && user.can_delete_contact(),
            download: user.can(Capability::ExportContacts),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRepresentation {
    #[serde(flatten)]
    pub contact: Contact,
    pub full_name: String,
    pub actions: ContactActions,
}

impl ContactRepresentation {
    pub fn represent(contact: Contact, user: &CurrentUser) -> Self {
        Self {
            full_name: contact.full_name(),
            actions: ContactActions::for_user(user, &contact),
            contact,
        }
    }
}

/// One page of contacts along with where they came from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactCollection {
    #[serde(rename = "_type")]
    pub type_name: &'static str,
    pub total: usize,
    pub count: usize,
    pub offset: usize,
    pub source: SourceKind,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
    /// Contacts created while offline and not yet written to the database
    pub pending_sync: usize,
    pub elements: Vec<ContactRepresentation>,
}

impl ContactCollection {
    pub fn represent(list: ContactList, offset: usize, user: &CurrentUser) -> Self {
        let pending_sync = list.contacts.iter().filter(|c| c.pending_sync).count();
        let elements: Vec<_> = list
            .contacts
            .into_iter()
            .map(|contact| ContactRepresentation::represent(contact, user))
            .collect();

        Self {
            type_name: "Collection",
            total: list.total,
            count: elements.len(),
            offset,
            source: list.source,
            stale: list.stale,
            warning: list.warning,
            last_sync: list.last_sync,
            pending_sync,
            elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_models::{NewContact, Role};

    fn contact(owner_id: i64) -> Contact {
        NewContact {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            ..Default::default()
        }
        .into_contact(9, owner_id, None)
    }

    #[test]
    fn test_actions_follow_role() {
        let owner = CurrentUser::new(1, "una", "una@example.com", Role::User);
        let other = CurrentUser::new(2, "otto", "otto@example.com", Role::User);
        let root = CurrentUser::new(3, "sam", "sam@example.com", Role::Superadmin);

        let own = ContactActions::for_user(&owner, &contact(1));
        assert!(own.edit && !own.delete && own.download);

        let foreign = ContactActions::for_user(&other, &contact(1));
        assert!(!foreign.edit && !foreign.delete);

        let any = ContactActions::for_user(&root, &contact(1));
        assert!(any.edit && any.delete);
    }

    #[test]
    fn test_pending_contact_is_read_only() {
        let root = CurrentUser::new(3, "sam", "sam@example.com", Role::Superadmin);
        let mut pending = contact(3);
        pending.pending_sync = true;

        let actions = ContactActions::for_user(&root, &pending);
        assert!(!actions.edit && !actions.delete);
    }

    #[test]
    fn test_representation_is_flat() {
        let user = CurrentUser::new(1, "una", "una@example.com", Role::User);
        let json = serde_json::to_value(ContactRepresentation::represent(contact(1), &user)).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["actions"]["edit"], true);
    }
}
