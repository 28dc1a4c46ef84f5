//! CSV rendering
//!
//! Comma separated, every field quoted, one header row followed by one row
//! per record. Values are written verbatim; missing values are empty fields.

use chrono::SecondsFormat;
use cm_core::CmError;
use cm_models::{ChangelogEntry, Contact};
use csv::{QuoteStyle, WriterBuilder};
use thiserror::Error;
use tracing::debug;

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush export buffer: {0}")]
    Flush(String),

    #[error("Export is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

impl From<ExportError> for CmError {
    fn from(err: ExportError) -> Self {
        CmError::Internal(err.to_string())
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

const CONTACT_HEADERS: [&str; 9] = [
    "ID",
    "First Name",
    "Middle Name",
    "Last Name",
    "Birthday",
    "Phone",
    "Company",
    "Owner",
    "Created At",
];

const CHANGELOG_HEADERS: [&str; 7] = [
    "Timestamp",
    "User",
    "Action",
    "Entity",
    "Entity ID",
    "Description",
    "Details",
];

fn render<const N: usize>(headers: [&str; N], rows: Vec<[String; N]>) -> ExportResult<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record(headers)?;
    for row in &rows {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Contacts as CSV
pub fn contacts_to_csv(contacts: &[Contact]) -> ExportResult<String> {
    let rows = contacts
        .iter()
        .map(|c| {
            [
                c.id.to_string(),
                c.first_name.clone(),
                text(&c.middle_name),
                c.last_name.clone(),
                c.birthday.map(|d| d.to_string()).unwrap_or_default(),
                text(&c.phone),
                text(&c.company),
                text(&c.owner_name),
                c.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ]
        })
        .collect();

    debug!(count = contacts.len(), "Rendering contacts CSV");
    render(CONTACT_HEADERS, rows)
}

/// Changelog entries as CSV
pub fn changelog_to_csv(entries: &[ChangelogEntry]) -> ExportResult<String> {
    let rows = entries
        .iter()
        .map(|e| {
            [
                e.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                e.actor_name.clone(),
                e.action.as_str().to_string(),
                e.entity.as_str().to_string(),
                e.entity_id.map(|id| id.to_string()).unwrap_or_default(),
                e.description.clone(),
                e.details.as_ref().map(|d| d.to_string()).unwrap_or_default(),
            ]
        })
        .collect();

    debug!(count = entries.len(), "Rendering changelog CSV");
    render(CHANGELOG_HEADERS, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use cm_models::{ChangelogAction, ChangelogEntity};

    fn contact(id: i64, first: &str, last: &str) -> Contact {
        Contact {
            id,
            first_name: first.into(),
            middle_name: None,
            last_name: last.into(),
            birthday: NaiveDate::from_ymd_opt(1990, 1, 15),
            phone: Some("+1 (555) 010-0100".into()),
            company: Some("Acme, Inc.".into()),
            owner_id: 1,
            owner_name: Some("Alice Admin".into()),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            pending_sync: false,
        }
    }

    #[test]
    fn test_contacts_line_count() {
        let contacts: Vec<_> = (1..=5).map(|i| contact(i, "First", "Last")).collect();
        let csv = contacts_to_csv(&contacts).unwrap();
        assert_eq!(csv.lines().count(), 6);
    }

    #[test]
    fn test_every_field_quoted() {
        let csv = contacts_to_csv(&[contact(7, "Ada", "Lovelace")]).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            r#""ID","First Name","Middle Name","Last Name","Birthday","Phone","Company","Owner","Created At""#
        );
        assert_eq!(
            lines.next().unwrap(),
            r#""7","Ada","","Lovelace","1990-01-15","+1 (555) 010-0100","Acme, Inc.","Alice Admin","2024-03-01T09:30:00Z""#
        );
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let mut c = contact(1, "Grace", "Hopper");
        c.company = Some(r#"The "Navy""#.into());
        let csv = contacts_to_csv(&[c]).unwrap();
        assert!(csv.contains(r#""The ""Navy""""#));
    }

    #[test]
    fn test_empty_list_is_header_only() {
        assert_eq!(contacts_to_csv(&[]).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_changelog_csv() {
        let entries = vec![ChangelogEntry {
            id: 1,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).unwrap(),
            actor_id: Some(1),
            actor_name: "Alice Admin".into(),
            action: ChangelogAction::Export,
            entity: ChangelogEntity::Contact,
            entity_id: None,
            description: "Exported 4 contacts as CSV".into(),
            details: Some(serde_json::json!({ "count": 4 })),
        }];

        let csv = changelog_to_csv(&entries).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            r#""2025-01-02T08:00:00Z","Alice Admin","export","contact","","Exported 4 contacts as CSV","{""count"":4}""#
        );
    }
}
