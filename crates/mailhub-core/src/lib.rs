//! # mailhub-core
//!
//! Core crate for MailHub. Contains traits, configuration schemas,
//! typed identifiers, limit value types, domain events, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other MailHub crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, LimitError};
pub use result::AppResult;
