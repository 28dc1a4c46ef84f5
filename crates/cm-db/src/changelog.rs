//! Changelog repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cm_changelog::{ChangelogError, ChangelogResult, ChangelogStore};
use cm_core::traits::Id;
use cm_models::{ChangelogEntity, ChangelogEntry, NewChangelogEntry};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::repository::RepositoryError;

const COLUMNS: &str =
    "id, timestamp, actor_id, actor_name, action, entity, entity_id, description, details";

#[derive(Debug, Clone, FromRow)]
pub struct ChangelogRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<i64>,
    pub actor_name: String,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<i64>,
    pub description: String,
    pub details: Option<Json<serde_json::Value>>,
}

impl TryFrom<ChangelogRow> for ChangelogEntry {
    type Error = ChangelogError;

    fn try_from(row: ChangelogRow) -> Result<Self, Self::Error> {
        Ok(ChangelogEntry {
            id: row.id,
            timestamp: row.timestamp,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            action: row.action.parse().map_err(ChangelogError::Storage)?,
            entity: row.entity.parse().map_err(ChangelogError::Storage)?,
            entity_id: row.entity_id,
            description: row.description,
            details: row.details.map(|Json(value)| value),
        })
    }
}

fn storage_error(err: sqlx::Error) -> ChangelogError {
    let err = RepositoryError::Database(err);
    if err.is_unavailable() {
        ChangelogError::Unavailable(err.to_string())
    } else {
        ChangelogError::Storage(err.to_string())
    }
}

fn into_entries(rows: Vec<ChangelogRow>) -> ChangelogResult<Vec<ChangelogEntry>> {
    rows.into_iter().map(ChangelogEntry::try_from).collect()
}

// LIMIT is bound as BIGINT
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Changelog repository implementation
pub struct ChangelogRepository {
    pool: PgPool,
}

impl ChangelogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangelogStore for ChangelogRepository {
    async fn append(&self, entry: NewChangelogEntry) -> ChangelogResult<ChangelogEntry> {
        let sql = format!(
            r#"
            INSERT INTO changelog (
                timestamp, actor_id, actor_name, action, entity, entity_id, description, details
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            COLUMNS
        );

        let row = sqlx::query_as::<_, ChangelogRow>(&sql)
            .bind(entry.timestamp)
            .bind(entry.actor_id)
            .bind(&entry.actor_name)
            .bind(entry.action.as_str())
            .bind(entry.entity.as_str())
            .bind(entry.entity_id)
            .bind(&entry.description)
            .bind(entry.details.map(Json))
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;

        ChangelogEntry::try_from(row)
    }

    async fn recent(&self, limit: usize) -> ChangelogResult<Vec<ChangelogEntry>> {
        let sql = format!(
            "SELECT {} FROM changelog ORDER BY timestamp DESC, id DESC LIMIT $1",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, ChangelogRow>(&sql)
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        into_entries(rows)
    }

    async fn by_actor(&self, actor_id: Id, limit: usize) -> ChangelogResult<Vec<ChangelogEntry>> {
        let sql = format!(
            "SELECT {} FROM changelog WHERE actor_id = $1 ORDER BY timestamp DESC, id DESC LIMIT $2",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, ChangelogRow>(&sql)
            .bind(actor_id)
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        into_entries(rows)
    }

    async fn by_entity(
        &self,
        entity: ChangelogEntity,
        entity_id: Id,
    ) -> ChangelogResult<Vec<ChangelogEntry>> {
        let sql = format!(
            "SELECT {} FROM changelog WHERE entity = $1 AND entity_id = $2 ORDER BY timestamp DESC, id DESC",
            COLUMNS
        );
        let rows = sqlx::query_as::<_, ChangelogRow>(&sql)
            .bind(entity.as_str())
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        into_entries(rows)
    }

    async fn count(&self) -> ChangelogResult<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM changelog")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(count.max(0) as usize)
    }
}
