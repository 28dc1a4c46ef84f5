//! Manual sync handler

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::info;

use crate::error::ApiResult;
use crate::extractors::{AppState, AuthenticatedUser};

/// Replay queued writes, drop cached lists and reload
///
/// POST /api/sync
pub async fn sync(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.sync.sync(&user).await?;
    state.refresh_feed("sync").await;
    info!(
        user_id = user.id,
        replayed = outcome.report.replayed,
        remaining = outcome.report.remaining,
        source = outcome.loaded.source.as_str(),
        "Manual sync"
    );
    Ok((StatusCode::OK, Json(outcome)))
}
