//! # cm-core
//!
//! Core types, traits, and utilities for Contact Hub.
//!
//! This crate provides the foundational building blocks used across all other crates:
//! - Common error types
//! - Result type aliases and the RPC envelope
//! - Core traits (Entity, Identifiable, Timestamped)
//! - Configuration types

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::*;
pub use result::*;
pub use traits::*;
