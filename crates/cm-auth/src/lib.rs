//! # cm-auth
//!
//! Authentication and authorization for Contact Hub.
//!
//! ## Features
//!
//! - JWT authentication (bearer header or cookie)
//! - Revocable sessions keyed by token id
//! - Argon2 password hashing and temporary passwords
//! - Capability checks for the current user

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod session;

pub use jwt::{Claims, IssuedToken, JwtError, JwtService};
pub use middleware::{AuthError, AuthSettings, AuthStrategy, Authenticator, RequestHeaders};
pub use password::{
    generate_temporary_password, hash_password, verify_password, PasswordError, PasswordPolicy,
};
pub use permissions::CurrentUser;
pub use session::{CookieConfig, MemorySessionStore, Session, SessionError, SessionStore};
