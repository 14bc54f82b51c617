//! Core traits defined in `mailhub-core` and implemented by other crates.

pub mod limit_store;
pub mod owner;
pub mod parameters;

pub use limit_store::{Decrement, Detached, LimitSeed, LimitStore, StoreCounts};
pub use owner::{OwnedObject, OwnerResolver};
pub use parameters::ParameterRepository;
