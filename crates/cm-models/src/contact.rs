//! Contact model
//!
//! Table: contacts

use chrono::{DateTime, NaiveDate, Utc};
use cm_core::traits::{Entity, Id, Identifiable, Timestamped};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Contact entity
///
/// Every contact belongs to exactly one owning user. `owner_name` is
/// denormalized from the owner's user record when the list is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Id,

    pub first_name: String,

    #[serde(default)]
    pub middle_name: Option<String>,

    pub last_name: String,

    #[serde(default)]
    pub birthday: Option<NaiveDate>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub company: Option<String>,

    pub owner_id: Id,

    #[serde(default)]
    pub owner_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Written locally but not yet confirmed by the database
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending_sync: bool,
}

impl Identifiable for Contact {
    fn id(&self) -> Option<Id> {
        Some(self.id)
    }
}

impl Timestamped for Contact {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }
}

impl Entity for Contact {
    const TABLE_NAME: &'static str = "contacts";
    const TYPE_NAME: &'static str = "Contact";
}

impl Contact {
    /// First, middle and last name joined by single spaces
    pub fn full_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.last_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn is_owned_by(&self, user_id: Id) -> bool {
        self.owner_id == user_id
    }
}

/// New contact parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    #[validate(length(max = 100))]
    #[serde(default)]
    pub first_name: String,

    #[validate(length(max = 100))]
    pub middle_name: Option<String>,

    #[validate(length(max = 100))]
    #[serde(default)]
    pub last_name: String,

    pub birthday: Option<NaiveDate>,

    #[validate(length(max = 32))]
    pub phone: Option<String>,

    #[validate(length(max = 200))]
    pub company: Option<String>,
}

impl NewContact {
    /// Build the contact that will be persisted for `owner_id`
    pub fn into_contact(self, id: Id, owner_id: Id, owner_name: Option<String>) -> Contact {
        let now = Utc::now();
        Contact {
            id,
            first_name: self.first_name,
            middle_name: self.middle_name,
            last_name: self.last_name,
            birthday: self.birthday,
            phone: self.phone,
            company: self.company,
            owner_id,
            owner_name,
            created_at: now,
            updated_at: now,
            pending_sync: false,
        }
    }
}

/// Contact update parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContact {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub middle_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    /// `None` keeps the birthday, `Some(None)` clears it
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub birthday: Option<Option<NaiveDate>>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub company: Option<String>,
}

/// A field that is present in the body, possibly as `null`
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trimmed value, `None` when blank
fn non_blank(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|s| !s.is_empty())
}

impl UpdateContact {
    /// Apply the present fields to `contact`
    pub fn apply_to(&self, contact: &mut Contact) {
        if let Some(first_name) = &self.first_name {
            contact.first_name = first_name.clone();
        }
        if let Some(middle_name) = &self.middle_name {
            contact.middle_name = non_blank(middle_name);
        }
        if let Some(last_name) = &self.last_name {
            contact.last_name = last_name.clone();
        }
        if let Some(birthday) = self.birthday {
            contact.birthday = birthday;
        }
        if let Some(phone) = &self.phone {
            contact.phone = non_blank(phone);
        }
        if let Some(company) = &self.company {
            contact.company = non_blank(company);
        }
        contact.updated_at = Utc::now();
    }

    /// Names of the attributes this update touches
    pub fn changed_attributes(&self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.first_name.is_some() {
            changed.push("firstName");
        }
        if self.middle_name.is_some() {
            changed.push("middleName");
        }
        if self.last_name.is_some() {
            changed.push("lastName");
        }
        if self.birthday.is_some() {
            changed.push("birthday");
        }
        if self.phone.is_some() {
            changed.push("phone");
        }
        if self.company.is_some() {
            changed.push("company");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> Contact {
        NewContact {
            first_name: "Grace".into(),
            middle_name: Some("Brewster".into()),
            last_name: "Hopper".into(),
            birthday: NaiveDate::from_ymd_opt(1906, 12, 9),
            phone: Some("+1 555 0100".into()),
            company: Some("Navy".into()),
        }
        .into_contact(7, 2, Some("Ada Lovelace".into()))
    }

    #[test]
    fn test_full_name() {
        let mut c = contact();
        assert_eq!(c.full_name(), "Grace Brewster Hopper");
        c.middle_name = Some("  ".into());
        assert_eq!(c.full_name(), "Grace Hopper");
    }

    #[test]
    fn test_ownership() {
        let c = contact();
        assert!(c.is_owned_by(2));
        assert!(!c.is_owned_by(3));
    }

    #[test]
    fn test_update_clears_empty_optional_fields() {
        let mut c = contact();
        let update = UpdateContact {
            company: Some(String::new()),
            last_name: Some("Murray".into()),
            ..Default::default()
        };
        update.apply_to(&mut c);
        assert_eq!(c.company, None);
        assert_eq!(c.last_name, "Murray");
        assert_eq!(update.changed_attributes(), vec!["lastName", "company"]);
    }

    #[test]
    fn test_update_clears_birthday_with_null() {
        let mut c = contact();

        let untouched: UpdateContact = serde_json::from_str(r#"{"company": "Navy"}"#).unwrap();
        assert_eq!(untouched.birthday, None);
        untouched.apply_to(&mut c);
        assert_eq!(c.birthday, NaiveDate::from_ymd_opt(1906, 12, 9));

        let cleared: UpdateContact = serde_json::from_str(r#"{"birthday": null}"#).unwrap();
        assert_eq!(cleared.birthday, Some(None));
        assert_eq!(cleared.changed_attributes(), vec!["birthday"]);
        cleared.apply_to(&mut c);
        assert_eq!(c.birthday, None);

        let set: UpdateContact = serde_json::from_str(r#"{"birthday": "1990-01-15"}"#).unwrap();
        set.apply_to(&mut c);
        assert_eq!(c.birthday, NaiveDate::from_ymd_opt(1990, 1, 15));
    }

    #[test]
    fn test_update_trims_optional_fields() {
        let mut c = contact();
        let update = UpdateContact {
            phone: Some("  +1 555 0199 ".into()),
            middle_name: Some("   ".into()),
            ..Default::default()
        };
        update.apply_to(&mut c);
        assert_eq!(c.phone.as_deref(), Some("+1 555 0199"));
        assert_eq!(c.middle_name, None);
    }

    #[test]
    fn test_pending_sync_only_serialized_when_set() {
        let mut c = contact();
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("pendingSync").is_none());
        assert_eq!(json["ownerId"], 2);

        c.pending_sync = true;
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["pendingSync"], true);
    }
}
