//! Chronos Common - Shared types and utilities
//!
//! This crate provides the identity types, the checked error type and the
//! configuration structures used by every Chronos component.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
