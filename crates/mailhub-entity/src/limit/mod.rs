//! Limit pool and limit entities.

pub mod model;
pub mod pool;

pub use model::Limit;
pub use pool::LimitPool;
