//! Collaborative birthday reminders
//!
//! Advance notices for contacts owned by someone else, so the current user
//! can coordinate with the owner ahead of time.

use chrono::NaiveDate;
use cm_core::traits::Id;
use serde::Serialize;

use crate::birthdays::{BirthdayBuckets, UpcomingBirthday};

/// A birthday reminder addressed to the current user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayReminder {
    pub contact_id: Id,
    pub contact_name: String,
    pub owner_id: Id,
    pub owner_name: String,
    pub date: NaiveDate,
    pub days_until: i64,
    pub message: String,
}

impl BirthdayReminder {
    fn from_upcoming(upcoming: &UpcomingBirthday) -> Self {
        let contact = &upcoming.contact;
        let contact_name = contact.full_name();
        let owner_name = contact
            .owner_name
            .clone()
            .unwrap_or_else(|| format!("user #{}", contact.owner_id));

        let message = format!(
            "{} turns {} on {} (in {} days). Contact owner: {}",
            contact_name,
            upcoming.turning,
            upcoming.date.format("%B %-d"),
            upcoming.days_until,
            owner_name
        );

        Self {
            contact_id: contact.id,
            contact_name,
            owner_id: contact.owner_id,
            owner_name,
            date: upcoming.date,
            days_until: upcoming.days_until,
            message,
        }
    }
}

/// One reminder per advance-notice birthday owned by another user
pub fn collaborative_reminders(buckets: &BirthdayBuckets) -> Vec<BirthdayReminder> {
    buckets
        .advance_notice_others
        .iter()
        .map(BirthdayReminder::from_upcoming)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::birthdays::classify_birthdays;
    use crate::birthdays::tests::{contact, date};

    #[test]
    fn test_reminders_only_for_other_owners() {
        let today = date(2025, 1, 1);
        let contacts = vec![
            contact(1, "Mine", Some(date(1990, 2, 10)), 1),
            contact(2, "Theirs", Some(date(1990, 2, 20)), 2),
        ];

        let reminders = collaborative_reminders(&classify_birthdays(&contacts, today, 1));

        assert_eq!(reminders.len(), 1);
        let reminder = &reminders[0];
        assert_eq!(reminder.contact_id, 2);
        assert_eq!(reminder.owner_name, "Owner 2");
        assert_eq!(reminder.days_until, 50);
        assert_eq!(
            reminder.message,
            "Theirs Test turns 35 on February 20 (in 50 days). Contact owner: Owner 2"
        );
    }

    #[test]
    fn test_missing_owner_name() {
        let today = date(2025, 1, 1);
        let mut c = contact(7, "Orphan", Some(date(1990, 2, 20)), 9);
        c.owner_name = None;

        let reminders = collaborative_reminders(&classify_birthdays(&[c], today, 1));
        assert_eq!(reminders[0].owner_name, "user #9");
    }
}
