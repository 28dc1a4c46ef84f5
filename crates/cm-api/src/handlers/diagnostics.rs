//! Connection diagnostics

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use cm_core::CmError;
use cm_models::Capability;
use serde_json::json;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{AppState, AuthenticatedUser};

/// GET /api/diagnostics/connection
pub async fn connection(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    if !user.can(Capability::ViewDiagnostics) {
        return Err(ApiError::forbidden("Only superadmins can view diagnostics"));
    }

    let feed = state.feed.snapshot();
    let pending = state.contacts.pending().len().await.map_err(CmError::from)?;

    let database = match state.rpc.debug_connection().await {
        Ok(envelope) => json!({
            "reachable": true,
            "success": envelope.success,
            "data": envelope.data,
            "error": envelope.error,
        }),
        Err(e) => {
            warn!(error = %e, "Diagnostics call failed");
            json!({ "reachable": false, "error": e.to_string() })
        }
    };

    let response = json!({
        "database": database,
        "feed": {
            "generation": feed.generation,
            "refreshedAt": feed.refreshed_at,
            "trigger": feed.trigger,
            "stale": feed.stale,
            "lastError": feed.last_error,
            "contacts": feed.contacts.len(),
        },
        "pendingOperations": pending,
    });
    Ok((StatusCode::OK, Json(response)))
}
