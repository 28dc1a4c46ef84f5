//! Dashboard handlers: birthday windows and changelog activity

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Local, NaiveDate, Utc};
use cm_changelog::ActivitySummary;
use cm_core::CmError;
use cm_models::Capability;
use cm_notifications::{classify_birthdays, collaborative_reminders};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{AppState, AuthenticatedUser};

/// Entries considered by the activity summary
const ACTIVITY_WINDOW: usize = 1000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BirthdayParams {
    /// Reference date; defaults to the server's local date
    pub today: Option<NaiveDate>,
}

/// GET /api/dashboard/birthdays
pub async fn birthdays(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<BirthdayParams>,
) -> ApiResult<impl IntoResponse> {
    if !user.can(Capability::ViewContacts) {
        return Err(ApiError::forbidden("You are not allowed to view contacts"));
    }

    let (contacts, source, stale) = if state.feed.is_fresh() {
        let snapshot = state.feed.snapshot();
        debug!(generation = snapshot.generation, "Birthdays from the contact feed");
        (snapshot.contacts, "feed", false)
    } else {
        let loaded = state.contacts.load(&user).await?;
        (loaded.contacts, loaded.source.as_str(), loaded.stale)
    };

    let today = params.today.unwrap_or_else(|| Local::now().date_naive());
    let buckets = classify_birthdays(&contacts, today, user.id);
    let reminders = collaborative_reminders(&buckets);

    let response = json!({
        "today": today,
        "source": source,
        "stale": stale,
        "buckets": buckets,
        "reminders": reminders,
    });
    Ok((StatusCode::OK, Json(response)))
}

/// GET /api/dashboard/activity
pub async fn activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    if !user.can(Capability::ViewChangelog) {
        return Err(ApiError::forbidden("You are not allowed to view activity"));
    }

    let entries = state
        .changelog
        .recent(ACTIVITY_WINDOW)
        .await
        .map_err(CmError::from)?;
    let summary = ActivitySummary::compute(&entries, Utc::now());
    Ok((StatusCode::OK, Json(summary)))
}
