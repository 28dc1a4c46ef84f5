//! User repository
//!
//! Database operations for users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cm_core::traits::Id;
use cm_models::{Role, UpdateUser, User};
use sqlx::{FromRow, PgPool};

use crate::repository::{CreateUserDto, RepositoryError, RepositoryResult, UserStore};

const USER_COLUMNS: &str = "id, name, email, username, role, employee_number, position, avatar, \
     hashed_password, must_change_password, last_login_on, created_at, updated_at";

/// User database entity
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub employee_number: Option<String>,
    pub position: Option<String>,
    pub avatar: Option<String>,
    pub hashed_password: Option<String>,
    pub must_change_password: bool,
    pub last_login_on: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Validation(e))?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            username: row.username,
            role,
            employee_number: row.employee_number,
            position: row.position,
            avatar: row.avatar,
            hashed_password: row.hashed_password,
            must_change_password: row.must_change_password,
            last_login_on: row.last_login_on,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_users(rows: Vec<UserRow>) -> RepositoryResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

/// User repository implementation
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_where(&self, condition: &str, value: &str) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        self.find_where("LOWER(username) = LOWER($1)", username).await
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.find_where("LOWER(email) = LOWER($1)", email).await
    }

    async fn find_by_login(&self, login: &str) -> RepositoryResult<Option<User>> {
        self.find_where(
            "LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1)",
            login.trim(),
        )
        .await
    }

    async fn list(&self) -> RepositoryResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY name ASC, id ASC", USER_COLUMNS);
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_users(rows)
    }

    async fn create(&self, dto: CreateUserDto) -> RepositoryResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (
                name, email, username, role, employee_number, position, avatar,
                hashed_password, must_change_password, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&dto.name)
            .bind(&dto.email)
            .bind(&dto.username)
            .bind(dto.role.as_str())
            .bind(&dto.employee_number)
            .bind(&dto.position)
            .bind(&dto.avatar)
            .bind(&dto.hashed_password)
            .bind(dto.must_change_password)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(user_id = row.id, username = %row.username, "Created user");
        User::try_from(row)
    }

    async fn update(&self, id: Id, changes: &UpdateUser) -> RepositoryResult<User> {
        let sql = format!(
            r#"
            UPDATE users SET
                name = COALESCE($1, name),
                email = COALESCE($2, email),
                username = COALESCE($3, username),
                role = COALESCE($4, role),
                employee_number = COALESCE($5, employee_number),
                position = COALESCE($6, position),
                avatar = COALESCE($7, avatar),
                updated_at = NOW()
            WHERE id = $8
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&changes.name)
            .bind(&changes.email)
            .bind(&changes.username)
            .bind(changes.role.map(|r| r.as_str()))
            .bind(&changes.employee_number)
            .bind(&changes.position)
            .bind(&changes.avatar)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("User with id {} not found", id)))?;

        User::try_from(row)
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "User with id {} not found",
                id
            )));
        }

        Ok(())
    }

    async fn update_password(
        &self,
        id: Id,
        hashed_password: &str,
        must_change_password: bool,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET hashed_password = $1, must_change_password = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(hashed_password)
        .bind(must_change_password)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "User with id {} not found",
                id
            )));
        }

        Ok(())
    }

    async fn touch_last_login(&self, id: Id) -> RepositoryResult<()> {
        sqlx::query("UPDATE users SET last_login_on = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn username_exists(&self, username: &str) -> RepositoryResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        UserRow {
            id: 1,
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            username: "alovelace".into(),
            role: role.into(),
            employee_number: Some("E-1".into()),
            position: None,
            avatar: None,
            hashed_password: None,
            must_change_password: true,
            last_login_on: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let user = User::try_from(row("superadmin")).unwrap();
        assert_eq!(user.role, Role::Superadmin);
        assert!(user.must_change_password);
        assert_eq!(user.employee_number.as_deref(), Some("E-1"));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(matches!(
            User::try_from(row("owner")),
            Err(RepositoryError::Validation(_))
        ));
    }
}
