//! Contact filters
//!
//! Filters are evaluated against an in-memory list. A [`FilterSet`] combines
//! its filters with logical AND, so the order in which they are added never
//! changes the result.

use chrono::NaiveDate;
use cm_core::traits::Id;
use cm_models::Contact;
use std::collections::HashSet;

/// Filter operators that can be applied to values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equals (=)
    Equals,
    /// Case-insensitive substring (~)
    Contains,
    /// Inclusive range (<>d)
    Between,
    /// Is null/empty (*)
    IsNull,
    /// Is not null/empty (!*)
    IsNotNull,
}

impl FilterOperator {
    /// Parse operator from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Self::Equals),
            "~" => Some(Self::Contains),
            "<>d" => Some(Self::Between),
            "*" => Some(Self::IsNull),
            "!*" => Some(Self::IsNotNull),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::Contains => "~",
            Self::Between => "<>d",
            Self::IsNull => "*",
            Self::IsNotNull => "!*",
        }
    }

    /// Check if this operator requires values
    pub fn requires_values(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// Filter value types
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Id(Id),
    String(String),
    /// Inclusive date range; an open end is unbounded
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    /// No value (for null checks)
    None,
}

/// Known filter attributes for contacts
pub mod attributes {
    /// Free text over name, phone, company and owner
    pub const SEARCH: &str = "search";
    pub const COMPANY: &str = "company";
    /// Owner display name
    pub const OWNER: &str = "owner";
    pub const OWNER_ID: &str = "owner_id";
    pub const PHONE: &str = "phone";
    pub const BIRTHDAY: &str = "birthday";

    pub const ALL: &[&str] = &[SEARCH, COMPANY, OWNER, OWNER_ID, PHONE, BIRTHDAY];
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// The attribute being filtered (see [`attributes`])
    pub attribute: String,
    pub operator: FilterOperator,
    pub values: FilterValue,
}

impl Filter {
    pub fn new(attribute: impl Into<String>, operator: FilterOperator, values: FilterValue) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            values,
        }
    }

    pub fn equals(attribute: impl Into<String>, values: FilterValue) -> Self {
        Self::new(attribute, FilterOperator::Equals, values)
    }

    pub fn contains(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            attribute,
            FilterOperator::Contains,
            FilterValue::String(value.into()),
        )
    }

    pub fn between(
        attribute: impl Into<String>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Self {
        Self::new(
            attribute,
            FilterOperator::Between,
            FilterValue::DateRange { from, to },
        )
    }

    pub fn is_null(attribute: impl Into<String>) -> Self {
        Self::new(attribute, FilterOperator::IsNull, FilterValue::None)
    }

    pub fn is_not_null(attribute: impl Into<String>) -> Self {
        Self::new(attribute, FilterOperator::IsNotNull, FilterValue::None)
    }

    /// Check if this filter is valid
    pub fn is_valid(&self) -> bool {
        if !attributes::ALL.contains(&self.attribute.as_str()) {
            return false;
        }

        if self.operator.requires_values() {
            !matches!(self.values, FilterValue::None)
        } else {
            true
        }
    }

    /// Evaluate the filter against a single contact
    pub fn matches(&self, contact: &Contact) -> bool {
        match self.attribute.as_str() {
            attributes::SEARCH => {
                let full_name = contact.full_name();
                self.match_text(&search_haystacks(contact, &full_name))
            }
            attributes::COMPANY => self.match_optional_text(contact.company.as_deref()),
            attributes::OWNER => self.match_optional_text(contact.owner_name.as_deref()),
            attributes::OWNER_ID => match (&self.operator, &self.values) {
                (FilterOperator::Equals, FilterValue::Id(id)) => contact.owner_id == *id,
                _ => false,
            },
            attributes::PHONE => self.match_phone(contact.phone.as_deref()),
            attributes::BIRTHDAY => self.match_date(contact.birthday),
            _ => true,
        }
    }

    fn match_optional_text(&self, value: Option<&str>) -> bool {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        match self.operator {
            FilterOperator::IsNull => value.is_none(),
            FilterOperator::IsNotNull => value.is_some(),
            _ => value.is_some_and(|v| self.match_text(&[v])),
        }
    }

    fn match_text(&self, haystacks: &[&str]) -> bool {
        let FilterValue::String(needle) = &self.values else {
            return false;
        };
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        match self.operator {
            FilterOperator::Contains => haystacks
                .iter()
                .any(|h| h.to_lowercase().contains(&needle)),
            FilterOperator::Equals => haystacks.iter().any(|h| h.trim().to_lowercase() == needle),
            _ => false,
        }
    }

    fn match_phone(&self, phone: Option<&str>) -> bool {
        match self.operator {
            FilterOperator::IsNull | FilterOperator::IsNotNull => self.match_optional_text(phone),
            _ => {
                let Some(phone) = phone else {
                    return false;
                };
                let FilterValue::String(needle) = &self.values else {
                    return false;
                };
                let needle_digits = digits(needle);
                if needle_digits.is_empty() {
                    // No digits to compare, fall back to plain text
                    return self.match_text(&[phone]);
                }
                digits(phone).contains(&needle_digits)
            }
        }
    }

    fn match_date(&self, date: Option<NaiveDate>) -> bool {
        match (&self.operator, &self.values) {
            (FilterOperator::IsNull, _) => date.is_none(),
            (FilterOperator::IsNotNull, _) => date.is_some(),
            (FilterOperator::Between, FilterValue::DateRange { from, to }) => {
                date.is_some_and(|d| from.map_or(true, |f| d >= f) && to.map_or(true, |t| d <= t))
            }
            _ => false,
        }
    }
}

fn search_haystacks<'a>(contact: &'a Contact, full_name: &'a str) -> Vec<&'a str> {
    let mut haystacks = vec![full_name];
    haystacks.extend(contact.phone.as_deref());
    haystacks.extend(contact.company.as_deref());
    haystacks.extend(contact.owner_name.as_deref());
    haystacks
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// Filter set - a collection of filters with AND semantics
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self { filters: vec![] }
    }

    pub fn add(&mut self, filter: Filter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Add a filter and return self (builder pattern)
    pub fn with(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn has_filter_for(&self, attribute: &str) -> bool {
        self.filters.iter().any(|f| f.attribute == attribute)
    }

    pub fn filtered_attributes(&self) -> HashSet<&str> {
        self.filters.iter().map(|f| f.attribute.as_str()).collect()
    }

    pub fn is_valid(&self) -> bool {
        self.filters.iter().all(|f| f.is_valid())
    }

    /// True when every filter matches
    pub fn matches(&self, contact: &Contact) -> bool {
        self.filters.iter().all(|f| f.matches(contact))
    }

    /// Keep only the contacts matching every filter, preserving order
    pub fn apply(&self, contacts: Vec<Contact>) -> Vec<Contact> {
        if self.is_empty() {
            return contacts;
        }
        contacts.into_iter().filter(|c| self.matches(c)).collect()
    }
}
