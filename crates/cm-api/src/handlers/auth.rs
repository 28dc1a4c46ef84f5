//! Authentication handlers

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{into_result, ApiResult};
use crate::extractors::{AppState, AuthenticatedUser};
use crate::representers::MeRepresentation;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = state.auth.login(&body.login, &body.password).await?;
    let cookie = state.cookie.build_cookie(&session.token);

    let must_change_password = session.user.must_change_password;
    let response = json!({
        "token": session.token,
        "expiresAt": session.expires_at,
        "user": session.user,
        "mustChangePassword": must_change_password,
    });

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    state.auth.logout(&user).await?;
    let cookie = state.cookie.build_clear_cookie();
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

/// GET /api/auth/me
pub async fn me(user: AuthenticatedUser) -> ApiResult<impl IntoResponse> {
    Ok((StatusCode::OK, Json(MeRepresentation::represent(user.0))))
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .auth
        .change_password(&user, &body.current_password, &body.password)
        .await?;
    into_result(result)?;
    Ok(StatusCode::NO_CONTENT)
}
