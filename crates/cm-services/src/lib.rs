//! # cm-services
//!
//! Business logic services for Contact Hub.
//!
//! Services check the caller's capabilities, run contracts, persist through
//! the store traits of `cm-db`, record changelog entries and keep the two
//! cache tiers consistent. Contract failures come back as a failed
//! [`ServiceResult`]; infrastructure and permission failures as `CmError`.

pub mod auth;
pub mod cache;
pub mod contacts;
pub mod loader;
pub mod pending;
pub mod preferences;
pub mod result;
pub mod sync;
pub mod users;

pub use auth::{AuthService, LoginResult, PasswordReset};
pub use cache::{
    Cache, CacheEntry, CacheError, CacheKey, CacheResult, CacheStore, Cached, FileCache,
    MemoryCache, TieredCache,
};
pub use contacts::{ContactList, ContactService};
pub use loader::{ContactLoader, ContactSource, LoadedContacts, SourceError, SourceKind};
pub use pending::{PendingOperation, PendingQueue};
pub use preferences::PreferenceService;
pub use result::ServiceResult;
pub use sync::{SyncOutcome, SyncReport, SyncService};
pub use users::{CreatedUser, UserService};
