//! # mailhub-plugin
//!
//! Extension framework for MailHub. Provides:
//!
//! - Extension registry with declared dependencies and deterministic load order
//! - Phased boot (load, subscribe, ready, announce)
//! - Hook registry with priority-ordered registration
//! - Hook dispatcher with abort-on-create and skip-on-teardown semantics

pub mod hooks;
pub mod manager;
pub mod registry;

pub use hooks::definitions::{HookOutput, HookPayload, HookPoint, HookResult};
pub use hooks::dispatcher::HookDispatcher;
pub use hooks::registry::{HookHandler, HookRegistry};
pub use manager::ExtensionManager;
pub use registry::{Extension, ExtensionInfo, ExtensionRegistry};
