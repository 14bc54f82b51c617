//! # mailhub-entity
//!
//! Domain entity models for MailHub. Every struct in this crate
//! represents a database table row or a domain value object. Database
//! entities derive `sqlx::FromRow`.

pub mod limit;
pub mod user;
