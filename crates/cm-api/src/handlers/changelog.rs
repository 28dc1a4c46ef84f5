//! Changelog API handlers

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use cm_core::traits::Id;
use cm_core::CmError;
use cm_export::{changelog_to_csv, CSV_CONTENT_TYPE};
use cm_models::{Capability, ChangelogEntity, ChangelogEntry};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{AppState, AuthenticatedUser};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangelogParams {
    pub limit: Option<usize>,
    pub actor_id: Option<Id>,
    pub entity: Option<ChangelogEntity>,
    pub entity_id: Option<Id>,
}

impl ChangelogParams {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

async fn entries(state: &AppState, params: &ChangelogParams) -> ApiResult<Vec<ChangelogEntry>> {
    let result = match (params.entity, params.entity_id, params.actor_id) {
        (Some(entity), Some(entity_id), _) => {
            let mut history = state.changelog.history(entity, entity_id).await;
            if let Ok(entries) = &mut history {
                entries.truncate(params.limit());
            }
            history
        }
        (None, Some(_), _) | (Some(_), None, _) => {
            return Err(ApiError::bad_request("entity and entityId must be given together"));
        }
        (None, None, Some(actor_id)) => state.changelog.by_actor(actor_id, params.limit()).await,
        (None, None, None) => state.changelog.recent(params.limit()).await,
    };
    Ok(result.map_err(CmError::from)?)
}

/// GET /api/changelog
pub async fn list_changelog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<ChangelogParams>,
) -> ApiResult<impl IntoResponse> {
    if !user.can(Capability::ViewChangelog) {
        return Err(ApiError::forbidden("You are not allowed to view the changelog"));
    }

    let entries = entries(&state, &params).await?;
    let response = json!({
        "_type": "Collection",
        "count": entries.len(),
        "elements": entries,
    });
    Ok((StatusCode::OK, Json(response)))
}

/// GET /api/changelog/export
pub async fn export_changelog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<ChangelogParams>,
) -> ApiResult<impl IntoResponse> {
    if !user.can(Capability::ExportChangelog) {
        return Err(ApiError::forbidden("You are not allowed to export the changelog"));
    }

    let entries = entries(&state, &params).await?;
    let body = changelog_to_csv(&entries).map_err(CmError::from)?;
    state
        .changelog
        .record_export(user.id, user.display_name(), "changelog entries", entries.len())
        .await;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"changelog.csv\"".to_string(),
            ),
        ],
        body,
    ))
}
