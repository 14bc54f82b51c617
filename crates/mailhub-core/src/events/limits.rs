//! Limit-related queries published on the event bus.

use serde::{Deserialize, Serialize};

use crate::types::id::UserId;
use crate::types::limit::LimitKind;

/// Queries answered by the limits extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LimitsEvent {
    /// May this account create one more resource of this kind?
    CanCreate {
        /// The account about to create a resource.
        user_id: UserId,
        /// The limit kind the resource counts against.
        kind: LimitKind,
    },
}
