//! # cm-api
//!
//! JSON HTTP API for Contact Hub.
//!
//! Handlers authenticate through [`extractors::AuthenticatedUser`], call
//! into `cm-services` and map every failure onto [`error::ApiError`].

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod representers;
pub mod routes;

pub use extractors::{AppState, Stores};
pub use routes::router;
