//! Preferences and terms acceptance handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use cm_models::UpdatePreferences;
use serde_json::json;

use crate::error::{into_result, ApiResult};
use crate::extractors::{AppState, AuthenticatedUser};

/// GET /api/preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let preferences = state.preferences.get(&user).await?;
    let terms_accepted = state.preferences.has_accepted_terms(&preferences);
    let response = json!({
        "preferences": preferences,
        "termsVersion": state.preferences.terms_version(),
        "termsAccepted": terms_accepted,
        "appTitle": state.instance.app_title,
    });
    Ok((StatusCode::OK, Json(response)))
}

/// PUT /api/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdatePreferences>,
) -> ApiResult<impl IntoResponse> {
    let (preferences, message) = into_result(state.preferences.update(&user, body).await?)?;
    let response = json!({
        "preferences": preferences,
        "message": message,
    });
    Ok((StatusCode::OK, Json(response)))
}

/// POST /api/preferences/terms
pub async fn accept_terms(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let (preferences, message) = into_result(state.preferences.accept_terms(&user).await?)?;
    let response = json!({
        "preferences": preferences,
        "termsAccepted": true,
        "message": message,
    });
    Ok((StatusCode::OK, Json(response)))
}
