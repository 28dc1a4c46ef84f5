//! # cm-export
//!
//! Download formats: CSV for contact and changelog lists, vCard 3.0 for a
//! single contact.

pub mod csv_export;
pub mod vcard;

pub use csv_export::{changelog_to_csv, contacts_to_csv, ExportError, ExportResult};
pub use vcard::{contact_to_vcard, vcard_filename, VCARD_CONTENT_TYPE};

/// Content type of CSV downloads
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
