//! Sort orders for contact lists

use cm_models::Contact;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A-Z, oldest first)
    #[default]
    Asc,
    /// Descending order (Z-A, newest first)
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Asc),
            "desc" | "descending" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn reverse(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Sortable contact attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Last name, then first name
    #[default]
    Name,
    Birthday,
    Company,
    Owner,
    CreatedAt,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "name" | "last_name" | "lastname" => Some(Self::Name),
            "birthday" => Some(Self::Birthday),
            "company" => Some(Self::Company),
            "owner" => Some(Self::Owner),
            "created_at" | "createdat" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Birthday => "birthday",
            Self::Company => "company",
            Self::Owner => "owner",
            Self::CreatedAt => "created_at",
        }
    }
}

/// Sort order for a contact list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn asc(field: SortField) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: SortField) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Compare two contacts. Missing values sort last in either direction
    /// and ties fall back to the contact id.
    pub fn compare(&self, a: &Contact, b: &Contact) -> Ordering {
        let primary = match self.field {
            SortField::Name => Some(self.directed(name_key(a).cmp(&name_key(b)))),
            SortField::Birthday => missing_last(a.birthday, b.birthday, |x, y| self.directed(x.cmp(&y))),
            SortField::Company => missing_last(text_key(&a.company), text_key(&b.company), |x, y| {
                self.directed(x.cmp(&y))
            }),
            SortField::Owner => missing_last(
                text_key(&a.owner_name),
                text_key(&b.owner_name),
                |x, y| self.directed(x.cmp(&y)),
            ),
            SortField::CreatedAt => Some(self.directed(a.created_at.cmp(&b.created_at))),
        };

        primary
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Sort in place
    pub fn sort(&self, contacts: &mut [Contact]) {
        contacts.sort_by(|a, b| self.compare(a, b));
    }

    fn directed(&self, ordering: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

fn name_key(contact: &Contact) -> (String, String) {
    (
        contact.last_name.to_lowercase(),
        contact.first_name.to_lowercase(),
    )
}

fn text_key(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

// Returns None when both sides are missing so the id tiebreak applies
fn missing_last<T>(a: Option<T>, b: Option<T>, cmp: impl FnOnce(T, T) -> Ordering) -> Option<Ordering> {
    match (a, b) {
        (Some(a), Some(b)) => Some(cmp(a, b)),
        (Some(_), None) => Some(Ordering::Less),
        (None, Some(_)) => Some(Ordering::Greater),
        (None, None) => None,
    }
}
