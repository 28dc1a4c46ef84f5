//! Contact list query parameters

use chrono::NaiveDate;
use cm_core::traits::Id;
use cm_models::Contact;
use serde::Deserialize;

use crate::filters::{attributes, Filter, FilterSet, FilterValue};
use crate::sorts::{SortDirection, SortField, SortOrder};

/// Upper bound for a single page
pub const MAX_LIMIT: usize = 500;

/// Query-string form of a contact list request
///
/// Every field is optional; an empty query returns the whole list sorted
/// by name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactQuery {
    /// Free-text search
    pub q: Option<String>,
    pub company: Option<String>,
    /// Owner display name
    pub owner: Option<String>,
    pub owner_id: Option<Id>,
    pub phone: Option<String>,
    pub birthday_from: Option<NaiveDate>,
    pub birthday_to: Option<NaiveDate>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ContactQuery {
    /// Build the filter set; blank text values are skipped
    pub fn filter_set(&self) -> FilterSet {
        let mut filters = FilterSet::new();

        let text_filters = [
            (attributes::SEARCH, &self.q),
            (attributes::COMPANY, &self.company),
            (attributes::OWNER, &self.owner),
            (attributes::PHONE, &self.phone),
        ];
        for (attribute, value) in text_filters {
            if let Some(value) = non_blank(value) {
                filters.add(Filter::contains(attribute, value));
            }
        }

        if let Some(owner_id) = self.owner_id {
            filters.add(Filter::equals(attributes::OWNER_ID, FilterValue::Id(owner_id)));
        }

        if self.birthday_from.is_some() || self.birthday_to.is_some() {
            filters.add(Filter::between(
                attributes::BIRTHDAY,
                self.birthday_from,
                self.birthday_to,
            ));
        }

        filters
    }

    /// Sort order; unknown fields fall back to name ascending
    pub fn sort_order(&self) -> SortOrder {
        let field = self
            .sort
            .as_deref()
            .and_then(SortField::parse)
            .unwrap_or_default();
        let direction = self
            .direction
            .as_deref()
            .and_then(SortDirection::parse)
            .unwrap_or_default();
        SortOrder::new(field, direction)
    }

    /// Filter, sort, then slice `contacts`
    pub fn apply(&self, contacts: Vec<Contact>) -> Vec<Contact> {
        let mut contacts = self.filter_set().apply(contacts);
        self.sort_order().sort(&mut contacts);

        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT);
        contacts.into_iter().skip(offset).take(limit).collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::sample;

    fn ids(contacts: &[Contact]) -> Vec<Id> {
        contacts.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_empty_query_sorts_by_name() {
        let result = ContactQuery::default().apply(sample());
        assert_eq!(ids(&result), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let query: ContactQuery = serde_json::from_value(serde_json::json!({
            "q": "ada",
            "ownerId": 1,
            "birthdayFrom": "1800-01-01",
            "sort": "birthday",
            "direction": "desc"
        }))
        .unwrap();

        assert_eq!(query.owner_id, Some(1));
        assert_eq!(query.birthday_from, NaiveDate::from_ymd_opt(1800, 1, 1));
        assert_eq!(query.filter_set().len(), 3);
        assert_eq!(
            query.sort_order(),
            SortOrder::desc(SortField::Birthday)
        );
    }

    #[test]
    fn test_blank_values_add_no_filters() {
        let query = ContactQuery {
            q: Some("   ".into()),
            company: Some(String::new()),
            ..Default::default()
        };
        assert!(query.filter_set().is_empty());
    }

    #[test]
    fn test_filter_sort_and_page() {
        let query = ContactQuery {
            owner: Some("alice".into()),
            sort: Some("birthday".into()),
            direction: Some("desc".into()),
            ..Default::default()
        };
        assert_eq!(ids(&query.apply(sample())), vec![3, 1]);

        let paged = ContactQuery {
            offset: Some(1),
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(ids(&paged.apply(sample())), vec![4, 1]);
    }

    #[test]
    fn test_unknown_sort_falls_back_to_name() {
        let query = ContactQuery {
            sort: Some("salary".into()),
            direction: Some("sideways".into()),
            ..Default::default()
        };
        assert_eq!(query.sort_order(), SortOrder::default());
    }
}
