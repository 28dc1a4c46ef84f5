//! Request authentication
//!
//! Tries each configured strategy in order. The first strategy that finds a
//! credential decides the outcome; strategies without a credential are skipped.

use std::sync::Arc;
use thiserror::Error;

use crate::jwt::{extract_bearer_token, JwtError, JwtService};
use crate::permissions::CurrentUser;
use crate::session::{extract_cookie, CookieConfig, SessionStore};

/// Authentication errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication required")]
    Required,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token expired")]
    TokenExpired,
    #[error("Session has been signed out")]
    SessionRevoked,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

/// Authentication strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// `Authorization: Bearer <token>`
    Jwt,
    /// Token carried in the session cookie
    Cookie,
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_service: Arc<JwtService>,
    /// When present, tokens are only accepted while their session exists
    pub session_store: Option<Arc<dyn SessionStore>>,
    pub cookie_config: CookieConfig,
    /// Enabled authentication strategies (in order of preference)
    pub strategies: Vec<AuthStrategy>,
}

impl AuthSettings {
    pub fn new(jwt_service: Arc<JwtService>) -> Self {
        Self {
            jwt_service,
            session_store: None,
            cookie_config: CookieConfig::default(),
            strategies: vec![AuthStrategy::Jwt, AuthStrategy::Cookie],
        }
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn with_cookie_config(mut self, config: CookieConfig) -> Self {
        self.cookie_config = config;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<AuthStrategy>) -> Self {
        self.strategies = strategies;
        self
    }
}

/// Authenticator for validating requests
pub struct Authenticator {
    settings: AuthSettings,
}

impl Authenticator {
    pub fn new(settings: AuthSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Authenticate a request using available headers
    pub fn authenticate(&self, headers: &RequestHeaders) -> Result<CurrentUser, AuthError> {
        for strategy in &self.settings.strategies {
            let token = match strategy {
                AuthStrategy::Jwt => headers
                    .authorization
                    .as_deref()
                    .and_then(extract_bearer_token)
                    .map(str::to_string),
                AuthStrategy::Cookie => headers
                    .cookie
                    .as_deref()
                    .and_then(|c| extract_cookie(c, &self.settings.cookie_config.name)),
            };

            if let Some(token) = token {
                return self.authenticate_token(&token);
            }
        }

        Err(AuthError::Required)
    }

    /// Validate a raw token and its session
    pub fn authenticate_token(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let claims = self
            .settings
            .jwt_service
            .validate_token(token)
            .map_err(|e| match e {
                JwtError::Expired => AuthError::TokenExpired,
                _ => AuthError::InvalidCredentials,
            })?;

        let user = CurrentUser::from_claims(&claims).map_err(|_| AuthError::InvalidCredentials)?;

        if let Some(store) = &self.settings.session_store {
            match store.get(&claims.jti) {
                Some(session) if session.user_id == user.id => {}
                _ => {
                    tracing::debug!(user_id = user.id, "Rejected token without live session");
                    return Err(AuthError::SessionRevoked);
                }
            }
        }

        Ok(user)
    }
}

/// Request headers relevant for authentication
#[derive(Debug, Default)]
pub struct RequestHeaders {
    pub authorization: Option<String>,
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestHeaders {
    /// Create from a list of header key-value pairs
    pub fn from_pairs(pairs: &[(impl AsRef<str>, impl AsRef<str>)]) -> Self {
        let mut headers = Self::default();

        for (name, value) in pairs {
            let value = value.as_ref().to_string();

            match name.as_ref().to_ascii_lowercase().as_str() {
                "authorization" => headers.authorization = Some(value),
                "cookie" => headers.cookie = Some(value),
                "user-agent" => headers.user_agent = Some(value),
                _ => {}
            }
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::tests::{user, SECRET};
    use crate::session::{MemorySessionStore, Session};
    use cm_models::Role;

    fn authenticator(store: Option<Arc<MemorySessionStore>>) -> Authenticator {
        let mut settings = AuthSettings::new(Arc::new(JwtService::new(SECRET)));
        if let Some(store) = store {
            settings = settings.with_session_store(store);
        }
        Authenticator::new(settings)
    }

    #[test]
    fn test_jwt_authentication() {
        let issued = JwtService::new(SECRET)
            .create_token(&user(1, Role::Admin), 3600)
            .unwrap();

        let headers = RequestHeaders {
            authorization: Some(format!("Bearer {}", issued.token)),
            ..Default::default()
        };

        let current = authenticator(None).authenticate(&headers).unwrap();
        assert_eq!(current.id, 1);
        assert_eq!(current.role, Role::Admin);
        assert_eq!(current.session_id.as_deref(), Some(issued.jti.as_str()));
    }

    #[test]
    fn test_cookie_authentication() {
        let issued = JwtService::new(SECRET)
            .create_token(&user(5, Role::User), 3600)
            .unwrap();

        let headers = RequestHeaders::from_pairs(&[(
            "Cookie",
            format!("theme=dark; contact_hub_token={}", issued.token),
        )]);

        let current = authenticator(None).authenticate(&headers).unwrap();
        assert_eq!(current.id, 5);
    }

    #[test]
    fn test_authentication_required() {
        let result = authenticator(None).authenticate(&RequestHeaders::default());
        assert_eq!(result.unwrap_err(), AuthError::Required);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let headers = RequestHeaders::from_pairs(&[("Authorization", "Bearer nope")]);
        let result = authenticator(None).authenticate(&headers);
        assert_eq!(result.unwrap_err(), AuthError::InvalidCredentials);
    }

    #[test]
    fn test_revoked_session_rejected() {
        let store = Arc::new(MemorySessionStore::new());
        let issued = JwtService::new(SECRET)
            .create_token(&user(1, Role::User), 3600)
            .unwrap();
        store
            .set(Session::new(issued.jti.clone(), 1, issued.expires_at))
            .unwrap();

        let auth = authenticator(Some(store.clone()));
        assert!(auth.authenticate_token(&issued.token).is_ok());

        store.delete(&issued.jti).unwrap();
        assert_eq!(
            auth.authenticate_token(&issued.token).unwrap_err(),
            AuthError::SessionRevoked
        );
    }

    #[test]
    fn test_request_headers_from_pairs() {
        let headers = RequestHeaders::from_pairs(&[
            ("Authorization", "Bearer token123"),
            ("Cookie", "contact_hub_token=abc"),
            ("User-Agent", "curl"),
        ]);

        assert_eq!(headers.authorization, Some("Bearer token123".to_string()));
        assert_eq!(headers.cookie, Some("contact_hub_token=abc".to_string()));
        assert_eq!(headers.user_agent, Some("curl".to_string()));
    }
}
