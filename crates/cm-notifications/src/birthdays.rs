//! Birthday windows
//!
//! Contacts are bucketed by the number of days until their next birthday:
//! today (0), the next 30 days (1 to 30) and advance notice (31 to 60).
//! A birthday that already passed this year counts toward next year. People
//! born on 29 February celebrate on 28 February in non-leap years.

use chrono::{Datelike, NaiveDate};
use cm_core::traits::Id;
use cm_models::Contact;
use serde::Serialize;

/// Last day of the "next 30 days" window
pub const UPCOMING_DAYS: i64 = 30;
/// Last day of the advance notice window
pub const ADVANCE_NOTICE_DAYS: i64 = 60;

/// The birthday's anniversary in `year`
fn anniversary(birthday: NaiveDate, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
        .unwrap_or(birthday)
}

/// Next date, on or after `today`, on which the birthday is celebrated
pub fn next_occurrence(birthday: NaiveDate, today: NaiveDate) -> NaiveDate {
    let this_year = anniversary(birthday, today.year());
    if this_year >= today {
        this_year
    } else {
        anniversary(birthday, today.year() + 1)
    }
}

/// Days from `today` until the next birthday; 0 when it is today
pub fn days_until(birthday: NaiveDate, today: NaiveDate) -> i64 {
    (next_occurrence(birthday, today) - today).num_days()
}

/// A contact with an upcoming birthday
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingBirthday {
    pub contact: Contact,
    pub date: NaiveDate,
    pub days_until: i64,
    /// Age reached on `date`
    pub turning: i32,
}

impl UpcomingBirthday {
    fn new(contact: &Contact, birthday: NaiveDate, today: NaiveDate) -> Self {
        let date = next_occurrence(birthday, today);
        Self {
            contact: contact.clone(),
            date,
            days_until: (date - today).num_days(),
            turning: date.year() - birthday.year(),
        }
    }
}

/// Contacts partitioned by birthday window
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthdayBuckets {
    pub today: Vec<UpcomingBirthday>,
    /// Sorted by days until the birthday
    pub next_30_days: Vec<UpcomingBirthday>,
    /// 31 to 60 days ahead, sorted by days until the birthday
    pub advance_notice: Vec<UpcomingBirthday>,
    /// The part of `advance_notice` owned by other users
    pub advance_notice_others: Vec<UpcomingBirthday>,
}

impl BirthdayBuckets {
    pub fn is_empty(&self) -> bool {
        self.today.is_empty() && self.next_30_days.is_empty() && self.advance_notice.is_empty()
    }
}

/// Partition `contacts` into birthday windows relative to `today`
///
/// Contacts without a birthday, or further than 60 days away, are left out.
pub fn classify_birthdays(
    contacts: &[Contact],
    today: NaiveDate,
    current_user_id: Id,
) -> BirthdayBuckets {
    let mut buckets = BirthdayBuckets::default();

    for contact in contacts {
        let Some(birthday) = contact.birthday else {
            continue;
        };
        let upcoming = UpcomingBirthday::new(contact, birthday, today);

        match upcoming.days_until {
            0 => buckets.today.push(upcoming),
            1..=UPCOMING_DAYS => buckets.next_30_days.push(upcoming),
            d if d <= ADVANCE_NOTICE_DAYS => {
                if !contact.is_owned_by(current_user_id) {
                    buckets.advance_notice_others.push(upcoming.clone());
                }
                buckets.advance_notice.push(upcoming);
            }
            _ => {}
        }
    }

    for bucket in [
        &mut buckets.today,
        &mut buckets.next_30_days,
        &mut buckets.advance_notice,
        &mut buckets.advance_notice_others,
    ] {
        bucket.sort_by(|a, b| {
            a.days_until
                .cmp(&b.days_until)
                .then_with(|| a.contact.full_name().cmp(&b.contact.full_name()))
                .then_with(|| a.contact.id.cmp(&b.contact.id))
        });
    }

    buckets
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn contact(id: Id, name: &str, birthday: Option<NaiveDate>, owner_id: Id) -> Contact {
        Contact {
            id,
            first_name: name.into(),
            middle_name: None,
            last_name: "Test".into(),
            birthday,
            phone: None,
            company: None,
            owner_id,
            owner_name: Some(format!("Owner {}", owner_id)),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            pending_sync: false,
        }
    }

    #[test]
    fn test_days_until() {
        let today = date(2025, 1, 1);
        assert_eq!(days_until(date(1990, 1, 1), today), 0);
        assert_eq!(days_until(date(1990, 1, 15), today), 14);
        assert_eq!(days_until(date(1990, 2, 20), today), 50);
    }

    #[test]
    fn test_passed_birthday_wraps_to_next_year() {
        let today = date(2025, 12, 31);
        assert_eq!(days_until(date(1990, 1, 2), today), 2);
        assert_eq!(next_occurrence(date(1990, 12, 30), today), date(2026, 12, 30));
    }

    #[test]
    fn test_leap_day_birthday() {
        let leap = date(2000, 2, 29);
        assert_eq!(next_occurrence(leap, date(2025, 2, 1)), date(2025, 2, 28));
        assert_eq!(next_occurrence(leap, date(2025, 3, 1)), date(2026, 2, 28));
        assert_eq!(next_occurrence(leap, date(2028, 2, 1)), date(2028, 2, 29));
    }

    #[test]
    fn test_classify_windows() {
        let today = date(2025, 1, 1);
        let contacts = vec![
            contact(1, "Today", Some(date(1990, 1, 1)), 1),
            contact(2, "Soon", Some(date(1990, 1, 15)), 1),
            contact(3, "Later", Some(date(1990, 2, 20)), 2),
            contact(4, "Far", Some(date(1990, 6, 1)), 2),
            contact(5, "Unknown", None, 2),
        ];

        let buckets = classify_birthdays(&contacts, today, 1);

        assert_eq!(buckets.today.len(), 1);
        assert_eq!(buckets.today[0].contact.id, 1);
        assert_eq!(buckets.today[0].turning, 35);
        assert_eq!(buckets.next_30_days.len(), 1);
        assert_eq!(buckets.next_30_days[0].days_until, 14);
        assert_eq!(buckets.advance_notice.len(), 1);
        assert_eq!(buckets.advance_notice[0].days_until, 50);
        assert_eq!(buckets.advance_notice_others.len(), 1);
    }

    #[test]
    fn test_each_contact_in_at_most_one_window() {
        let today = date(2025, 3, 15);
        let contacts: Vec<_> = (0..400)
            .map(|i| {
                let birthday = date(1980, 1, 1) + chrono::Duration::days(i);
                contact(i, "C", Some(birthday), i % 3)
            })
            .collect();

        let buckets = classify_birthdays(&contacts, today, 0);

        for c in &contacts {
            let d = days_until(c.birthday.unwrap(), today);
            let hits = [&buckets.today, &buckets.next_30_days, &buckets.advance_notice]
                .iter()
                .filter(|bucket| bucket.iter().any(|u| u.contact.id == c.id))
                .count();
            let expected = usize::from(d <= ADVANCE_NOTICE_DAYS);
            assert_eq!(hits, expected, "contact {} ({} days)", c.id, d);
        }
    }

    #[test]
    fn test_next_30_days_sorted_by_distance() {
        let today = date(2025, 1, 1);
        let contacts = vec![
            contact(1, "B", Some(date(1990, 1, 20)), 1),
            contact(2, "A", Some(date(1990, 1, 5)), 1),
            contact(3, "C", Some(date(1990, 1, 31)), 1),
        ];

        let buckets = classify_birthdays(&contacts, today, 1);
        let ids: Vec<_> = buckets.next_30_days.iter().map(|u| u.contact.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!(buckets.advance_notice_others.is_empty());
    }
}
