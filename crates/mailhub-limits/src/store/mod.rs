//! Store implementations living next to the accounting service.
//!
//! The PostgreSQL stores live in `mailhub-database`.

pub mod memory;

pub use memory::{MemoryLimitStore, MemoryParameterRepository};
