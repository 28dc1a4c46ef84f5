//! Application state and axum extractors for API handlers

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use cm_auth::{
    AuthSettings, Authenticator, CookieConfig, CurrentUser, JwtService, MemorySessionStore,
    PasswordPolicy, RequestHeaders, SessionStore,
};
use cm_changelog::{ChangelogService, ChangelogStore, MemoryChangelogStore};
use cm_core::config::AppConfig;
use cm_db::{ContactStore, MemoryDatabase, PreferenceStore, RpcClient, UserStore};
use cm_notifications::{ContactFeed, FeedSource, StoreFeedSource};
use cm_services::{
    AuthService, ContactLoader, ContactService, PendingQueue, PreferenceService, SyncService,
    TieredCache, UserService,
};
use std::sync::Arc;

use crate::error::ApiError;

/// Persistence backends the services are built on
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub changelog: Arc<dyn ChangelogStore>,
    pub rpc: Arc<dyn RpcClient>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    /// Every store backed by one in-memory database
    pub fn memory(db: Arc<MemoryDatabase>) -> Self {
        Self {
            users: db.clone(),
            contacts: db.clone(),
            preferences: db.clone(),
            changelog: Arc::new(MemoryChangelogStore::new()),
            rpc: db,
            sessions: Arc::new(MemorySessionStore::new()),
        }
    }
}

/// Instance settings exposed to clients
#[derive(Clone, Debug)]
pub struct InstanceInfo {
    pub app_title: String,
    pub terms_version: String,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub instance: Arc<InstanceInfo>,
    pub authenticator: Arc<Authenticator>,
    pub cookie: CookieConfig,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub contacts: Arc<ContactService>,
    pub changelog: Arc<ChangelogService>,
    pub preferences: Arc<PreferenceService>,
    pub sync: Arc<SyncService>,
    pub feed: Arc<ContactFeed>,
    pub feed_source: Arc<dyn FeedSource>,
    pub rpc: Arc<dyn RpcClient>,
}

impl AppState {
    /// Wire every service over `stores` and `cache`
    pub fn new(config: &AppConfig, stores: Stores, cache: TieredCache) -> Self {
        let token_ttl = i64::try_from(config.auth.token_expiration_seconds).unwrap_or(i64::MAX);
        let policy = PasswordPolicy::with_min_length(config.auth.password_min_length);

        let jwt = Arc::new(JwtService::new(config.auth.jwt_secret.as_bytes()));
        let cookie = if config.auth.secure_cookies {
            CookieConfig::default()
        } else {
            CookieConfig::development()
        }
        .with_max_age(token_ttl);

        let authenticator = Arc::new(Authenticator::new(
            AuthSettings::new(jwt.clone())
                .with_session_store(stores.sessions.clone())
                .with_cookie_config(cookie.clone()),
        ));

        let changelog = Arc::new(ChangelogService::new(stores.changelog.clone()));
        let pending = Arc::new(PendingQueue::new(cache.local.clone()));
        let loader = Arc::new(
            ContactLoader::standard(stores.rpc.clone(), stores.contacts.clone(), cache.clone())
                .with_pending(pending.clone()),
        );

        let auth = AuthService::new(
            stores.users.clone(),
            jwt,
            stores.sessions.clone(),
            changelog.clone(),
        )
        .with_token_ttl(token_ttl)
        .with_policy(policy.clone());

        let users = UserService::new(
            stores.users.clone(),
            stores.contacts.clone(),
            stores.rpc.clone(),
            changelog.clone(),
            cache.clone(),
        )
        .with_policy(policy)
        .with_sessions(stores.sessions.clone());

        let contacts = ContactService::new(
            stores.contacts.clone(),
            loader.clone(),
            pending.clone(),
            changelog.clone(),
            cache.clone(),
        );

        let sync = SyncService::new(
            stores.contacts.clone(),
            pending,
            changelog.clone(),
            cache.clone(),
            loader,
        );

        let preferences = PreferenceService::new(
            stores.preferences.clone(),
            cache,
            config.instance.terms_version.clone(),
        );

        Self {
            instance: Arc::new(InstanceInfo {
                app_title: config.instance.app_title.clone(),
                terms_version: config.instance.terms_version.clone(),
            }),
            authenticator,
            cookie,
            auth: Arc::new(auth),
            users: Arc::new(users),
            contacts: Arc::new(contacts),
            changelog,
            preferences: Arc::new(preferences),
            sync: Arc::new(sync),
            feed: Arc::new(ContactFeed::new()),
            feed_source: Arc::new(StoreFeedSource::new(stores.contacts.clone())),
            rpc: stores.rpc,
        }
    }
}

impl AppState {
    /// Re-read the contact feed after a write made through the API
    pub async fn refresh_feed(&self, trigger: &str) {
        self.feed.refresh(self.feed_source.as_ref(), trigger).await;
    }
}

/// Authenticated user extractor
///
/// Accepts a bearer token or the session cookie.
pub struct AuthenticatedUser(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let headers = request_headers(&parts.headers);

        let user = app_state.authenticator.authenticate(&headers)?;
        Ok(AuthenticatedUser(user))
    }
}

impl std::ops::Deref for AuthenticatedUser {
    type Target = CurrentUser;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn request_headers(headers: &HeaderMap) -> RequestHeaders {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    RequestHeaders {
        authorization: value(header::AUTHORIZATION),
        cookie: value(header::COOKIE),
        user_agent: value(header::USER_AGENT),
    }
}
