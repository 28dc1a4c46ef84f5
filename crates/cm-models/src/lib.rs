//! # cm-models
//!
//! Domain models for Contact Hub.
//!
//! Each model implements the core traits from `cm-core` (Entity, Identifiable, etc.)

pub use cm_core::traits::{Entity, Id, Identifiable, Timestamped};

pub mod changelog;
pub mod contact;
pub mod preference;
pub mod role;
pub mod user;

// Re-exports for convenience
pub use changelog::{ChangelogAction, ChangelogEntity, ChangelogEntry, NewChangelogEntry};
pub use contact::{Contact, NewContact, UpdateContact};
pub use preference::{UpdatePreferences, UserPreferences, ViewMode};
pub use role::{Capability, ContactAction};
pub use user::{NewUser, Role, UpdateUser, User};
