//! # cm-contracts
//!
//! Contract validation for Contact Hub.
//!
//! Contracts validate entities before create/update/delete operations and
//! check the acting user's capabilities.

pub mod base;
pub mod contacts;
pub mod users;

pub use base::*;
