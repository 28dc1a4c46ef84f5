//! Server-side function calls
//!
//! The listing and diagnostics functions installed by the migration return a
//! JSON envelope `{ success, data, error }`. A transport failure is a
//! [`RepositoryError`]; an unsuccessful envelope is returned as-is so the
//! caller can decide whether to move on to the next source.

use async_trait::async_trait;
use cm_core::traits::Id;
use cm_core::Envelope;
use cm_models::{Contact, Role};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::repository::RepositoryResult;

/// Named server-side functions
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn get_collaborative_contacts(&self, user_id: Id) -> RepositoryResult<Envelope<Vec<Contact>>>;

    async fn get_all_contacts_superadmin(&self, user_id: Id) -> RepositoryResult<Envelope<Vec<Contact>>>;

    async fn get_contacts_filtered(
        &self,
        user_id: Id,
        role: Role,
    ) -> RepositoryResult<Envelope<Vec<Contact>>>;

    async fn generate_username(&self, name: &str) -> RepositoryResult<Envelope<String>>;

    async fn debug_connection(&self) -> RepositoryResult<Envelope<Value>>;
}

/// Calls the functions over a Postgres pool
pub struct PgRpcClient {
    pool: PgPool,
}

impl PgRpcClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Decode an envelope; a payload that does not match `T` becomes a failed envelope
pub fn decode_envelope<T: DeserializeOwned>(raw: Value) -> Envelope<T> {
    match serde_json::from_value::<Envelope<T>>(raw) {
        Ok(envelope) => envelope,
        Err(e) => Envelope::failed(format!("malformed response: {}", e)),
    }
}

/// Username derived from a display name: first initial plus last name,
/// lowercased, with a numeric suffix while `taken` reports a clash.
/// Mirrors the `generate_username` function.
pub fn suggest_username(name: &str, taken: impl Fn(&str) -> bool) -> Option<String> {
    let parts: Vec<String> = name
        .split_whitespace()
        .map(|part| {
            part.to_lowercase()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
                .collect::<String>()
        })
        .filter(|part| !part.is_empty())
        .collect();

    let mut base = match parts.as_slice() {
        [] => return None,
        [only] => only.clone(),
        [first, .., last] => format!("{}{}", &first[..1], last),
    };
    while base.len() < 3 {
        base.push('0');
    }

    let mut candidate = base.clone();
    let mut suffix = 1;
    while taken(&candidate) {
        suffix += 1;
        candidate = format!("{}{}", base, suffix);
    }
    Some(candidate)
}

async fn fetch_envelope<T: DeserializeOwned>(
    query: sqlx::query::QueryScalar<'_, Postgres, Json<Value>, PgArguments>,
    pool: &PgPool,
) -> RepositoryResult<Envelope<T>> {
    let Json(raw) = query.fetch_one(pool).await?;
    Ok(decode_envelope(raw))
}

#[async_trait]
impl RpcClient for PgRpcClient {
    async fn get_collaborative_contacts(&self, user_id: Id) -> RepositoryResult<Envelope<Vec<Contact>>> {
        let query = sqlx::query_scalar::<_, Json<Value>>("SELECT get_collaborative_contacts($1)").bind(user_id);
        fetch_envelope(query, &self.pool).await
    }

    async fn get_all_contacts_superadmin(&self, user_id: Id) -> RepositoryResult<Envelope<Vec<Contact>>> {
        let query = sqlx::query_scalar::<_, Json<Value>>("SELECT get_all_contacts_superadmin($1)").bind(user_id);
        fetch_envelope(query, &self.pool).await
    }

    async fn get_contacts_filtered(
        &self,
        user_id: Id,
        role: Role,
    ) -> RepositoryResult<Envelope<Vec<Contact>>> {
        let query = sqlx::query_scalar::<_, Json<Value>>("SELECT get_contacts_filtered($1, $2)")
            .bind(user_id)
            .bind(role.as_str());
        fetch_envelope(query, &self.pool).await
    }

    async fn generate_username(&self, name: &str) -> RepositoryResult<Envelope<String>> {
        let query = sqlx::query_scalar::<_, Json<Value>>("SELECT generate_username($1)").bind(name);
        fetch_envelope(query, &self.pool).await
    }

    async fn debug_connection(&self) -> RepositoryResult<Envelope<Value>> {
        let query = sqlx::query_scalar::<_, Json<Value>>("SELECT debug_connection()");
        fetch_envelope(query, &self.pool).await
    }
}
