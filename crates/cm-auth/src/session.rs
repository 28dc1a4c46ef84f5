//! Server-side sessions
//!
//! A session is created for every issued token and keyed by the token's
//! `jti`. Deleting the session revokes the token even though its signature
//! is still valid.

use chrono::{DateTime, Utc};
use cm_core::traits::Id;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
    #[error("Session expired")]
    Expired,
}

/// Session data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Token id (`jti`)
    pub id: String,
    pub user_id: Id,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, user_id: Id, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id,
            created_at: now,
            accessed_at: now,
            expires_at,
            user_agent: None,
        }
    }

    /// Check if the session is still valid
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }

    /// Touch the session (update accessed_at)
    pub fn touch(&mut self) {
        self.accessed_at = Utc::now();
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Session store trait for different backends
pub trait SessionStore: Send + Sync {
    /// Get a valid session by ID
    fn get(&self, session_id: &str) -> Option<Session>;

    /// Store a session
    fn set(&self, session: Session) -> Result<(), SessionError>;

    /// Delete a session
    fn delete(&self, session_id: &str) -> Result<(), SessionError>;

    /// Delete all sessions for a user
    fn delete_user_sessions(&self, user_id: Id) -> usize;

    /// Clean up expired sessions
    fn cleanup_expired(&self) -> usize;
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(session_id).filter(|s| s.is_valid())?;
        session.touch();
        Some(session.clone())
    }

    fn set(&self, session: Session) -> Result<(), SessionError> {
        if !session.is_valid() {
            return Err(SessionError::Expired);
        }
        self.sessions.write().insert(session.id.clone(), session);
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions
            .write()
            .remove(session_id)
            .map(|_| ())
            .ok_or(SessionError::NotFound)
    }

    fn delete_user_sessions(&self, user_id: Id) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        before - sessions.len()
    }

    fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.is_valid());
        before - sessions.len()
    }
}

/// Cookie configuration for the session token
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub max_age: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "contact_hub_token".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age: None,
        }
    }
}

impl CookieConfig {
    /// Create a development configuration (non-secure)
    pub fn development() -> Self {
        Self {
            secure: false,
            ..Default::default()
        }
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Build the Set-Cookie header value carrying `token`
    pub fn build_cookie(&self, token: &str) -> String {
        let mut parts = vec![format!("{}={}", self.name, token)];

        parts.push(format!("Path={}", self.path));

        if self.secure {
            parts.push("Secure".to_string());
        }

        if self.http_only {
            parts.push("HttpOnly".to_string());
        }

        match self.same_site {
            SameSite::Strict => parts.push("SameSite=Strict".to_string()),
            SameSite::Lax => parts.push("SameSite=Lax".to_string()),
            SameSite::None => parts.push("SameSite=None".to_string()),
        }

        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age));
        }

        parts.join("; ")
    }

    /// Build cookie header to clear the token
    pub fn build_clear_cookie(&self) -> String {
        format!("{}=; Path={}; Max-Age=0; HttpOnly", self.name, self.path)
    }
}

/// Extract a cookie value from a Cookie header
pub fn extract_cookie(cookie_header: &str, cookie_name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(name, _)| name.trim() == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(id: &str, user_id: Id) -> Session {
        Session::new(id, user_id, Utc::now() + Duration::hours(1))
    }

    #[test]
    fn test_memory_session_store() {
        let store = MemorySessionStore::new();
        store.set(session("jti-1", 1)).unwrap();

        let retrieved = store.get("jti-1").unwrap();
        assert_eq!(retrieved.user_id, 1);

        store.delete("jti-1").unwrap();
        assert!(store.get("jti-1").is_none());
        assert!(matches!(store.delete("jti-1"), Err(SessionError::NotFound)));
    }

    #[test]
    fn test_expired_sessions_rejected() {
        let store = MemorySessionStore::new();
        let expired = Session::new("old", 1, Utc::now() - Duration::seconds(1));
        assert!(matches!(store.set(expired), Err(SessionError::Expired)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_user_sessions() {
        let store = MemorySessionStore::new();
        store.set(session("a", 1)).unwrap();
        store.set(session("b", 1)).unwrap();
        store.set(session("c", 2)).unwrap();

        assert_eq!(store.delete_user_sessions(1), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.cleanup_expired(), 0);
    }

    #[test]
    fn test_cookie_config() {
        let config = CookieConfig::default().with_max_age(60);
        let cookie = config.build_cookie("abc123");

        assert!(cookie.starts_with("contact_hub_token=abc123"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(!CookieConfig::development().build_cookie("x").contains("Secure"));
    }

    #[test]
    fn test_extract_cookie() {
        let cookie = "contact_hub_token=abc123; other=value";
        assert_eq!(
            extract_cookie(cookie, "contact_hub_token"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_cookie(cookie, "missing"), None);
        assert_eq!(extract_cookie("contact_hub_token=", "contact_hub_token"), None);
    }
}
