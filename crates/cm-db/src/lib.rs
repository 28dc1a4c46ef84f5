//! # cm-db
//!
//! Database layer for Contact Hub.
//!
//! This crate provides PostgreSQL access using SQLx, including:
//!
//! - Connection pool management and embedded migrations
//! - Store traits with Postgres repositories for users, contacts,
//!   changelog entries and preferences
//! - The client for the server-side listing and diagnostics functions
//! - An in-memory database implementing every store, for tests and
//!   offline mode
//!
//! ## Example
//!
//! ```ignore
//! use cm_db::{ContactRepository, ContactStore, Database};
//!
//! let db = Database::connect(&config.database).await?;
//! db.migrate().await?;
//!
//! let contacts = ContactRepository::new(db.pool().clone());
//! let all = contacts.list().await?;
//! ```

pub mod changelog;
pub mod contacts;
pub mod memory;
pub mod pool;
pub mod preferences;
pub mod repository;
pub mod rpc;
pub mod users;

// Re-exports
pub use changelog::ChangelogRepository;
pub use contacts::{ContactRepository, ContactRow};
pub use memory::MemoryDatabase;
pub use pool::{Database, PoolStats};
pub use preferences::PreferenceRepository;
pub use repository::{
    ContactStore, CreateUserDto, PreferenceStore, RepositoryError, RepositoryResult, UserStore,
};
pub use rpc::{suggest_username, PgRpcClient, RpcClient};
pub use users::{UserRepository, UserRow};
