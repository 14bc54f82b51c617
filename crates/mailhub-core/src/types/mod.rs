//! Core type definitions used across the MailHub workspace.

pub mod id;
pub mod limit;
pub mod parameter;

pub use id::*;
pub use limit::{Admission, LimitKind, LimitMax, LimitUsage};
pub use parameter::{ParameterField, ParameterLevel};
