//! API request handlers

pub mod auth;
pub mod changelog;
pub mod contacts;
pub mod dashboard;
pub mod diagnostics;
pub mod preferences;
pub mod sync;
pub mod users;
