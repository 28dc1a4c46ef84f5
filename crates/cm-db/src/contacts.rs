//! Contact repository
//!
//! Direct table access. Listing joins the owner's name manually so the
//! result matches what the listing functions return.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use cm_core::traits::Id;
use cm_models::{Contact, NewContact, UpdateContact};
use sqlx::{FromRow, PgPool};

use crate::repository::{ContactStore, RepositoryError, RepositoryResult};

const SELECT_WITH_OWNER: &str = r#"
    SELECT c.id, c.first_name, c.middle_name, c.last_name, c.birthday, c.phone,
           c.company, c.owner_id, u.name AS owner_name, c.created_at, c.updated_at
    FROM contacts c
    LEFT JOIN users u ON u.id = c.owner_id
"#;

const ORDER: &str = "ORDER BY c.last_name ASC, c.first_name ASC, c.id ASC";

/// Contact database entity, joined with the owner's name
#[derive(Debug, Clone, FromRow)]
pub struct ContactRow {
    pub id: i64,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub birthday: Option<NaiveDate>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub owner_id: i64,
    pub owner_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact {
            id: row.id,
            first_name: row.first_name,
            middle_name: row.middle_name,
            last_name: row.last_name,
            birthday: row.birthday,
            phone: row.phone,
            company: row.company,
            owner_id: row.owner_id,
            owner_name: row.owner_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
            pending_sync: false,
        }
    }
}

// Empty strings clear optional columns
fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Contact repository implementation
pub struct ContactRepository {
    pool: PgPool,
}

impl ContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactStore for ContactRepository {
    async fn list(&self) -> RepositoryResult<Vec<Contact>> {
        let sql = format!("{} {}", SELECT_WITH_OWNER, ORDER);
        let rows = sqlx::query_as::<_, ContactRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Contact::from).collect())
    }

    async fn list_by_owner(&self, owner_id: Id) -> RepositoryResult<Vec<Contact>> {
        let sql = format!("{} WHERE c.owner_id = $1 {}", SELECT_WITH_OWNER, ORDER);
        let rows = sqlx::query_as::<_, ContactRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Contact::from).collect())
    }

    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<Contact>> {
        let sql = format!("{} WHERE c.id = $1", SELECT_WITH_OWNER);
        let row = sqlx::query_as::<_, ContactRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Contact::from))
    }

    async fn create(&self, owner_id: Id, contact: &NewContact) -> RepositoryResult<Contact> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO contacts (
                first_name, middle_name, last_name, birthday, phone, company,
                owner_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(contact.first_name.trim())
        .bind(blank_to_none(&contact.middle_name))
        .bind(contact.last_name.trim())
        .bind(contact.birthday)
        .bind(blank_to_none(&contact.phone))
        .bind(blank_to_none(&contact.company))
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(contact_id = id, owner_id, "Created contact");

        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Contact with id {} not found", id)))
    }

    async fn update(&self, id: Id, changes: &UpdateContact) -> RepositoryResult<Contact> {
        // NULLIF turns an explicit empty string into a cleared column, while
        // an absent field (NULL parameter) keeps the current value. The
        // birthday carries a separate presence flag so null can clear it.
        let result = sqlx::query(
            r#"
            UPDATE contacts SET
                first_name = COALESCE($1, first_name),
                middle_name = CASE WHEN $2::TEXT IS NULL THEN middle_name ELSE NULLIF(TRIM($2), '') END,
                last_name = COALESCE($3, last_name),
                birthday = CASE WHEN $4 THEN $5 ELSE birthday END,
                phone = CASE WHEN $6::TEXT IS NULL THEN phone ELSE NULLIF(TRIM($6), '') END,
                company = CASE WHEN $7::TEXT IS NULL THEN company ELSE NULLIF(TRIM($7), '') END,
                updated_at = NOW()
            WHERE id = $8
            "#,
        )
        .bind(&changes.first_name)
        .bind(&changes.middle_name)
        .bind(&changes.last_name)
        .bind(changes.birthday.is_some())
        .bind(changes.birthday.flatten())
        .bind(&changes.phone)
        .bind(&changes.company)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Contact with id {} not found",
                id
            )));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Contact with id {} not found", id)))
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Contact with id {} not found",
                id
            )));
        }

        Ok(())
    }

    async fn count_by_owner(&self, owner_id: Id) -> RepositoryResult<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contacts WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as usize)
    }
}
