//! User preference repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cm_core::traits::Id;
use cm_models::{UserPreferences, ViewMode};
use sqlx::{FromRow, PgPool};

use crate::repository::{PreferenceStore, RepositoryResult};

#[derive(Debug, Clone, FromRow)]
pub struct PreferenceRow {
    pub user_id: i64,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub terms_version: Option<String>,
    pub active_tab: String,
    pub view_mode: String,
    pub updated_at: DateTime<Utc>,
}

impl From<PreferenceRow> for UserPreferences {
    fn from(row: PreferenceRow) -> Self {
        UserPreferences {
            user_id: row.user_id,
            terms_accepted_at: row.terms_accepted_at,
            terms_version: row.terms_version,
            active_tab: row.active_tab,
            view_mode: ViewMode::parse(&row.view_mode).unwrap_or_default(),
            updated_at: row.updated_at,
        }
    }
}

pub struct PreferenceRepository {
    pool: PgPool,
}

impl PreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for PreferenceRepository {
    async fn get(&self, user_id: Id) -> RepositoryResult<Option<UserPreferences>> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            r#"
            SELECT user_id, terms_accepted_at, terms_version, active_tab, view_mode, updated_at
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserPreferences::from))
    }

    async fn save(&self, preferences: &UserPreferences) -> RepositoryResult<UserPreferences> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            r#"
            INSERT INTO user_preferences (
                user_id, terms_accepted_at, terms_version, active_tab, view_mode, updated_at
            ) VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                terms_accepted_at = EXCLUDED.terms_accepted_at,
                terms_version = EXCLUDED.terms_version,
                active_tab = EXCLUDED.active_tab,
                view_mode = EXCLUDED.view_mode,
                updated_at = NOW()
            RETURNING user_id, terms_accepted_at, terms_version, active_tab, view_mode, updated_at
            "#,
        )
        .bind(preferences.user_id)
        .bind(preferences.terms_accepted_at)
        .bind(&preferences.terms_version)
        .bind(&preferences.active_tab)
        .bind(preferences.view_mode.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_view_mode_falls_back_to_table() {
        let prefs = UserPreferences::from(PreferenceRow {
            user_id: 1,
            terms_accepted_at: None,
            terms_version: None,
            active_tab: "dashboard".into(),
            view_mode: "grid".into(),
            updated_at: Utc::now(),
        });
        assert_eq!(prefs.view_mode, ViewMode::Table);
        assert_eq!(prefs.active_tab, "dashboard");
    }
}
