//! # mailhub-limits
//!
//! Per-owner resource limits for MailHub:
//!
//! - [`KindRegistry`]: catalog of limit kinds, sealed after boot
//! - [`ParameterStore`]: admin-scope default maxima
//! - [`LimitAccounting`]: increment, decrement, admission, backfill
//! - [`MemoryLimitStore`]: in-memory store and ownership ledger
//! - [`LimitsExtension`]: account lifecycle and admission hooks

pub mod accounting;
pub mod extension;
pub mod hooks;
pub mod parameters;
pub mod registry;
pub mod store;

pub use accounting::LimitAccounting;
pub use extension::{LIMITS_EXTENSION_ID, LimitsExtension};
pub use parameters::ParameterStore;
pub use registry::{KindRegistry, LimitKindInfo};
pub use store::{MemoryLimitStore, MemoryParameterRepository};
