//! API routes

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;

use crate::extractors::AppState;
use crate::handlers::{auth, changelog, contacts, dashboard, diagnostics, preferences, sync, users};

/// Create the complete API router
pub fn router() -> Router<AppState> {
    Router::new().nest("/api", api_router())
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/", get(api_root))
        .nest("/auth", auth_router())
        .nest("/users", users_router())
        .nest("/contacts", contacts_router())
        .nest("/changelog", changelog_router())
        .nest("/dashboard", dashboard_router())
        .nest("/preferences", preferences_router())
        .route("/sync", post(sync::sync))
        .route("/diagnostics/connection", get(diagnostics::connection))
}

fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password", put(auth::change_password))
}

fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/generate_username", get(users::generate_username))
        .route(
            "/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/:id/reset_password", post(users::reset_password))
}

fn contacts_router() -> Router<AppState> {
    Router::new()
        .route("/", get(contacts::list_contacts).post(contacts::create_contact))
        .route("/export", get(contacts::export_contacts))
        .route(
            "/:id",
            get(contacts::get_contact)
                .patch(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route("/:id/vcard", get(contacts::download_vcard))
}

fn changelog_router() -> Router<AppState> {
    Router::new()
        .route("/", get(changelog::list_changelog))
        .route("/export", get(changelog::export_changelog))
}

fn dashboard_router() -> Router<AppState> {
    Router::new()
        .route("/birthdays", get(dashboard::birthdays))
        .route("/activity", get(dashboard::activity))
}

fn preferences_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(preferences::get_preferences).put(preferences::update_preferences),
        )
        .route("/terms", post(preferences::accept_terms))
}

async fn api_root(State(state): State<AppState>) -> Json<ApiRoot> {
    Json(ApiRoot {
        type_name: "Root",
        instance_name: state.instance.app_title.clone(),
        terms_version: state.instance.terms_version.clone(),
    })
}

#[derive(Serialize)]
struct ApiRoot {
    #[serde(rename = "_type")]
    type_name: &'static str,
    #[serde(rename = "instanceName")]
    instance_name: String,
    #[serde(rename = "termsVersion")]
    terms_version: String,
}
