//! Repository implementations for MailHub entities.

pub mod limit;
pub mod parameter;

pub use limit::PgLimitStore;
pub use parameter::PgParameterRepository;
