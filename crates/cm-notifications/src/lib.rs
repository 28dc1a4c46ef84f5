//! # cm-notifications
//!
//! Birthday reminders and the shared contact feed.
//!
//! ## Features
//!
//! - Birthday windows: today, the next 30 days, and 31 to 60 days ahead
//! - Reminders about upcoming birthdays of other users' contacts
//! - A shared contact snapshot refreshed by a fixed-interval poller and by
//!   Postgres `LISTEN` notifications

pub mod birthdays;
pub mod feed;
pub mod listener;
pub mod poller;
pub mod reminders;

pub use birthdays::{classify_birthdays, days_until, next_occurrence, BirthdayBuckets, UpcomingBirthday};
pub use feed::{ContactFeed, FeedError, FeedSnapshot, FeedSource, RefreshOutcome, StoreFeedSource};
pub use listener::{ChangeListener, ChangeNotification};
pub use poller::Poller;
pub use reminders::{collaborative_reminders, BirthdayReminder};
