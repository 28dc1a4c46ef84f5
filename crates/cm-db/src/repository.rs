//! Repository error type and store traits
//!
//! Each store trait has a Postgres repository and an in-memory
//! implementation (see [`crate::memory`]).

use async_trait::async_trait;
use cm_core::traits::Id;
use cm_core::CmError;
use cm_models::{Contact, NewContact, Role, UpdateContact, UpdateUser, User, UserPreferences};

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    /// Whether the database could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    /// Unique and foreign-key violations surface as conflicts
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Database(sqlx::Error::Database(db)) => {
                db.is_unique_violation() || db.is_foreign_key_violation()
            }
            _ => false,
        }
    }
}

impl From<RepositoryError> for CmError {
    fn from(err: RepositoryError) -> Self {
        if err.is_unavailable() {
            return CmError::Unavailable {
                message: err.to_string(),
            };
        }
        if err.is_conflict() {
            return CmError::Conflict {
                message: err.to_string(),
            };
        }
        match err {
            RepositoryError::NotFound(message) => CmError::NotFound {
                entity: "record",
                field: "id",
                value: message,
            },
            RepositoryError::Validation(message) => CmError::Internal(message),
            other => CmError::Database(other.to_string()),
        }
    }
}

/// DTO for creating a user
#[derive(Debug, Clone)]
pub struct CreateUserDto {
    pub name: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub employee_number: Option<String>,
    pub position: Option<String>,
    pub avatar: Option<String>,
    pub hashed_password: Option<String>,
    pub must_change_password: bool,
}

/// User persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    /// Find by username or email, case-insensitively
    async fn find_by_login(&self, login: &str) -> RepositoryResult<Option<User>>;

    /// All users ordered by name
    async fn list(&self) -> RepositoryResult<Vec<User>>;

    async fn create(&self, dto: CreateUserDto) -> RepositoryResult<User>;

    async fn update(&self, id: Id, changes: &UpdateUser) -> RepositoryResult<User>;

    async fn delete(&self, id: Id) -> RepositoryResult<()>;

    async fn update_password(
        &self,
        id: Id,
        hashed_password: &str,
        must_change_password: bool,
    ) -> RepositoryResult<()>;

    async fn touch_last_login(&self, id: Id) -> RepositoryResult<()>;

    async fn username_exists(&self, username: &str) -> RepositoryResult<bool>;
}

/// Contact persistence
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Every contact with its owner's name
    async fn list(&self) -> RepositoryResult<Vec<Contact>>;

    async fn list_by_owner(&self, owner_id: Id) -> RepositoryResult<Vec<Contact>>;

    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Contact>>;

    async fn create(&self, owner_id: Id, contact: &NewContact) -> RepositoryResult<Contact>;

    async fn update(&self, id: Id, changes: &UpdateContact) -> RepositoryResult<Contact>;

    async fn delete(&self, id: Id) -> RepositoryResult<()>;

    async fn count_by_owner(&self, owner_id: Id) -> RepositoryResult<usize>;
}

/// Preference persistence
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: Id) -> RepositoryResult<Option<UserPreferences>>;

    /// Insert or replace
    async fn save(&self, preferences: &UserPreferences) -> RepositoryResult<UserPreferences>;
}
