//! # cm-changelog
//!
//! Audit trail for Contact Hub.
//!
//! Every write to a contact or user, every login and logout, and every
//! export or download appends one [`ChangelogEntry`](cm_models::ChangelogEntry).
//! Entries are never edited; the activity dashboard summarises them.

pub mod activity;
pub mod builder;
pub mod service;
pub mod store;

pub use activity::{ActivitySummary, ActorCount, DailyCount};
pub use builder::ChangelogBuilder;
pub use service::{ChangelogEvent, ChangelogService};
pub use store::{ChangelogError, ChangelogResult, ChangelogStore, MemoryChangelogStore};
