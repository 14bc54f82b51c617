//! # mailhub-database
//!
//! PostgreSQL connection management, the limit store backed by the
//! `limit_pools`, `limits` and `limit_owned_objects` tables, and the
//! `parameters` table.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{PgLimitStore, PgParameterRepository};
