//! Changelog (audit trail) model
//!
//! Table: changelog

use chrono::{DateTime, Utc};
use cm_core::traits::Id;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangelogAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    Export,
    Download,
}

impl ChangelogAction {
    pub const ALL: [ChangelogAction; 7] = [
        ChangelogAction::Create,
        ChangelogAction::Update,
        ChangelogAction::Delete,
        ChangelogAction::Login,
        ChangelogAction::Logout,
        ChangelogAction::Export,
        ChangelogAction::Download,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangelogAction::Create => "create",
            ChangelogAction::Update => "update",
            ChangelogAction::Delete => "delete",
            ChangelogAction::Login => "login",
            ChangelogAction::Logout => "logout",
            ChangelogAction::Export => "export",
            ChangelogAction::Download => "download",
        }
    }
}

impl fmt::Display for ChangelogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangelogAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown changelog action '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangelogEntity {
    Contact,
    User,
    System,
}

impl ChangelogEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangelogEntity::Contact => "contact",
            ChangelogEntity::User => "user",
            ChangelogEntity::System => "system",
        }
    }
}

impl fmt::Display for ChangelogEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangelogEntity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contact" => Ok(ChangelogEntity::Contact),
            "user" => Ok(ChangelogEntity::User),
            "system" => Ok(ChangelogEntity::System),
            other => Err(format!("unknown changelog entity '{}'", other)),
        }
    }
}

/// A persisted audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEntry {
    pub id: Id,
    pub timestamp: DateTime<Utc>,
    /// None for entries written by the system itself
    pub actor_id: Option<Id>,
    pub actor_name: String,
    pub action: ChangelogAction,
    pub entity: ChangelogEntity,
    pub entity_id: Option<Id>,
    pub description: String,
    pub details: Option<serde_json::Value>,
}

/// An entry that has not been stored yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChangelogEntry {
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<Id>,
    pub actor_name: String,
    pub action: ChangelogAction,
    pub entity: ChangelogEntity,
    pub entity_id: Option<Id>,
    pub description: String,
    pub details: Option<serde_json::Value>,
}

impl NewChangelogEntry {
    pub fn into_entry(self, id: Id) -> ChangelogEntry {
        ChangelogEntry {
            id,
            timestamp: self.timestamp,
            actor_id: self.actor_id,
            actor_name: self.actor_name,
            action: self.action,
            entity: self.entity,
            entity_id: self.entity_id,
            description: self.description,
            details: self.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trips_through_str() {
        for action in ChangelogAction::ALL {
            assert_eq!(action.as_str().parse::<ChangelogAction>(), Ok(action));
        }
        assert!("archive".parse::<ChangelogAction>().is_err());
    }

    #[test]
    fn test_entry_serializes_lowercase_enums() {
        let entry = NewChangelogEntry {
            timestamp: Utc::now(),
            actor_id: Some(1),
            actor_name: "Ada".into(),
            action: ChangelogAction::Download,
            entity: ChangelogEntity::Contact,
            entity_id: Some(9),
            description: "Downloaded vCard".into(),
            details: None,
        }
        .into_entry(3);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "download");
        assert_eq!(json["entity"], "contact");
        assert_eq!(json["entityId"], 9);
    }
}
