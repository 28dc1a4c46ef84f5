//! Users API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use cm_core::traits::Id;
use cm_models::{NewUser, UpdateUser};
use serde::Deserialize;
use serde_json::json;

use crate::error::{into_result, ApiResult};
use crate::extractors::{AppState, AuthenticatedUser};
use crate::representers::UserRepresentation;

#[derive(Debug, Deserialize)]
pub struct UsernameParams {
    #[serde(default)]
    pub name: String,
}

/// List users
///
/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let users = state.users.list(&user).await?;
    let elements: Vec<_> = users
        .into_iter()
        .map(|u| UserRepresentation::represent(u, &user))
        .collect();

    let response = json!({
        "_type": "Collection",
        "total": elements.len(),
        "elements": elements,
    });
    Ok((StatusCode::OK, Json(response)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    let found = state.users.get(&user, id).await?;
    Ok((StatusCode::OK, Json(UserRepresentation::represent(found, &user))))
}

/// Create a user; the temporary password, when one was generated, is
/// returned once
///
/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let (created, _) = into_result(state.users.create(&user, body).await?)?;

    let response = json!({
        "user": UserRepresentation::represent(created.user, &user),
        "temporaryPassword": created.temporary_password,
    });
    Ok((StatusCode::CREATED, Json(response)))
}

/// PATCH /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
    Json(body): Json<UpdateUser>,
) -> ApiResult<impl IntoResponse> {
    let (updated, _) = into_result(state.users.update(&user, id, body).await?)?;
    Ok((StatusCode::OK, Json(UserRepresentation::represent(updated, &user))))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    into_result(state.users.delete(&user, id).await?)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/:id/reset_password
pub async fn reset_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    let reset = state.auth.reset_password(&user, id).await?;
    state.users.after_write().await;

    let response = json!({
        "user": UserRepresentation::represent(reset.user, &user),
        "temporaryPassword": reset.temporary_password,
        "revokedSessions": reset.revoked_sessions,
    });
    Ok((StatusCode::OK, Json(response)))
}

/// GET /api/users/generate_username?name=
pub async fn generate_username(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<UsernameParams>,
) -> ApiResult<impl IntoResponse> {
    let username = state.users.generate_username(&params.name).await?;
    Ok((StatusCode::OK, Json(json!({ "username": username }))))
}
