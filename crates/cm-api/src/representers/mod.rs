//! Response representers
//!
//! Convert domain models into API responses, attaching the actions the
//! current user may take on each resource.

pub mod contact;
pub mod user;

pub use contact::{ContactActions, ContactCollection, ContactRepresentation};
pub use user::{MeRepresentation, UserActions, UserRepresentation};
