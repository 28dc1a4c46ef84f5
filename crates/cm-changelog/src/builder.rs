//! Changelog entry builder

use chrono::{DateTime, Utc};
use cm_core::traits::Id;
use cm_models::{ChangelogAction, ChangelogEntity, Contact, NewChangelogEntry, User};
use serde::Serialize;
use serde_json::{Map, Value};

/// Name recorded for entries written without a signed-in user
pub const SYSTEM_ACTOR: &str = "System";

/// Builds a [`NewChangelogEntry`]
pub struct ChangelogBuilder {
    entry: NewChangelogEntry,
    details: Map<String, Value>,
}

impl ChangelogBuilder {
    pub fn new(action: ChangelogAction, entity: ChangelogEntity) -> Self {
        Self {
            entry: NewChangelogEntry {
                timestamp: Utc::now(),
                actor_id: None,
                actor_name: SYSTEM_ACTOR.to_string(),
                action,
                entity,
                entity_id: None,
                description: String::new(),
                details: None,
            },
            details: Map::new(),
        }
    }

    /// Entry about a contact; the description defaults to the contact's name
    pub fn contact(action: ChangelogAction, contact: &Contact) -> Self {
        let verb = past_tense(action);
        Self::new(action, ChangelogEntity::Contact)
            .entity_id(contact.id)
            .description(format!("{} contact {}", verb, contact.full_name()))
            .detail("ownerId", contact.owner_id)
    }

    /// Entry about a user account
    pub fn user(action: ChangelogAction, user: &User) -> Self {
        let verb = past_tense(action);
        Self::new(action, ChangelogEntity::User)
            .entity_id(user.id)
            .description(format!("{} user {}", verb, user.username))
    }

    /// Entry about the system as a whole (logins, bulk exports)
    pub fn system(action: ChangelogAction, description: impl Into<String>) -> Self {
        Self::new(action, ChangelogEntity::System).description(description)
    }

    pub fn actor(mut self, id: Id, name: impl Into<String>) -> Self {
        self.entry.actor_id = Some(id);
        self.entry.actor_name = name.into();
        self
    }

    pub fn entity_id(mut self, id: Id) -> Self {
        self.entry.entity_id = Some(id);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.entry.description = description.into();
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.entry.timestamp = timestamp;
        self
    }

    /// Add a detail value; values that fail to serialize are stored as null
    pub fn detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.details
            .insert(key.into(), serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    /// Record the names of changed attributes
    pub fn changes(self, attributes: &[&str]) -> Self {
        if attributes.is_empty() {
            return self;
        }
        self.detail("changes", attributes)
    }

    pub fn build(mut self) -> NewChangelogEntry {
        if !self.details.is_empty() {
            self.entry.details = Some(Value::Object(self.details));
        }
        self.entry
    }
}

fn past_tense(action: ChangelogAction) -> &'static str {
    match action {
        ChangelogAction::Create => "Created",
        ChangelogAction::Update => "Updated",
        ChangelogAction::Delete => "Deleted",
        ChangelogAction::Login => "Logged in",
        ChangelogAction::Logout => "Logged out",
        ChangelogAction::Export => "Exported",
        ChangelogAction::Download => "Downloaded",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn contact(id: Id, owner_id: Id) -> Contact {
        Contact {
            id,
            first_name: "Ada".into(),
            middle_name: None,
            last_name: "Lovelace".into(),
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
    fn test_contact_entry() {
        let entry = ChangelogBuilder::contact(ChangelogAction::Update, &contact(4, 2))
            .actor(2, "Bob")
            .changes(&["phone", "company"])
            .build();

        assert_eq!(entry.entity, ChangelogEntity::Contact);
        assert_eq!(entry.entity_id, Some(4));
        assert_eq!(entry.actor_id, Some(2));
        assert_eq!(entry.description, "Updated contact Ada Lovelace");

        let details = entry.details.unwrap();
        assert_eq!(details["ownerId"], 2);
        assert_eq!(details["changes"][1], "company");
    }

    #[test]
    fn test_system_entry_defaults() {
        let entry = ChangelogBuilder::system(ChangelogAction::Export, "Exported 3 contacts").build();

        assert_eq!(entry.actor_id, None);
        assert_eq!(entry.actor_name, SYSTEM_ACTOR);
        assert_eq!(entry.entity_id, None);
        assert!(entry.details.is_none());
    }

    #[test]
    fn test_empty_changes_add_no_details() {
        let entry = ChangelogBuilder::system(ChangelogAction::Update, "noop")
            .changes(&[])
            .build();
        assert!(entry.details.is_none());
    }
}
