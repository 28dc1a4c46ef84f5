//! Contacts API handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use cm_core::traits::Id;
use cm_core::CmError;
use cm_export::{contact_to_vcard, contacts_to_csv, vcard_filename, CSV_CONTENT_TYPE, VCARD_CONTENT_TYPE};
use cm_models::{Capability, NewContact, UpdateContact};
use cm_queries::ContactQuery;
use serde_json::json;
use tracing::info;

use crate::error::{into_result, ApiError, ApiResult};
use crate::extractors::{AppState, AuthenticatedUser};
use crate::representers::{ContactCollection, ContactRepresentation};

/// List contacts through the fallback chain
///
/// GET /api/contacts
pub async fn list_contacts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ContactQuery>,
) -> ApiResult<impl IntoResponse> {
    let list = state.contacts.list(&user, &query).await?;
    let offset = query.offset.unwrap_or(0);
    Ok((StatusCode::OK, Json(ContactCollection::represent(list, offset, &user))))
}

/// GET /api/contacts/:id
pub async fn get_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    let contact = state.contacts.get(&user, id).await?;
    Ok((StatusCode::OK, Json(ContactRepresentation::represent(contact, &user))))
}

/// Create a contact; while the database is unreachable the contact is
/// queued and returned with `pendingSync` set
///
/// POST /api/contacts
pub async fn create_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<NewContact>,
) -> ApiResult<impl IntoResponse> {
    let (contact, message) = into_result(state.contacts.create(&user, body).await?)?;
    state.refresh_feed("write").await;
    let status = if contact.pending_sync {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };

    let response = json!({
        "contact": ContactRepresentation::represent(contact, &user),
        "message": message,
    });
    Ok((status, Json(response)))
}

/// PATCH /api/contacts/:id
pub async fn update_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
    Json(body): Json<UpdateContact>,
) -> ApiResult<impl IntoResponse> {
    let (contact, _) = into_result(state.contacts.update(&user, id, body).await?)?;
    state.refresh_feed("write").await;
    Ok((StatusCode::OK, Json(ContactRepresentation::represent(contact, &user))))
}

/// DELETE /api/contacts/:id
pub async fn delete_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    into_result(state.contacts.delete(&user, id).await?)?;
    state.refresh_feed("write").await;
    Ok(StatusCode::NO_CONTENT)
}

/// Single contact as a vCard attachment
///
/// GET /api/contacts/:id/vcard
pub async fn download_vcard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Id>,
) -> ApiResult<impl IntoResponse> {
    if !user.can(Capability::ExportContacts) {
        return Err(ApiError::forbidden("You are not allowed to download contacts"));
    }

    let contact = state.contacts.get(&user, id).await?;
    let body = contact_to_vcard(&contact);
    let disposition = format!("attachment; filename=\"{}\"", vcard_filename(&contact));
    state
        .changelog
        .record_download(user.id, user.display_name(), &contact)
        .await;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, VCARD_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// Every contact matching the query as CSV, unpaged
///
/// GET /api/contacts/export
pub async fn export_contacts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ContactQuery>,
) -> ApiResult<impl IntoResponse> {
    if !user.can(Capability::ExportContacts) {
        return Err(ApiError::forbidden("You are not allowed to export contacts"));
    }

    let loaded = state.contacts.load(&user).await?;
    let mut contacts = query.filter_set().apply(loaded.contacts);
    query.sort_order().sort(&mut contacts);

    let body = contacts_to_csv(&contacts).map_err(CmError::from)?;
    state
        .changelog
        .record_export(user.id, user.display_name(), "contacts", contacts.len())
        .await;
    info!(user_id = user.id, count = contacts.len(), source = loaded.source.as_str(), "Contacts exported");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"contacts.csv\"".to_string(),
            ),
        ],
        body,
    ))
}
