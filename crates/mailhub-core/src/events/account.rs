//! Account-related domain events.

use serde::{Deserialize, Serialize};

use crate::types::id::UserId;

/// Events related to administrator and user accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AccountEvent {
    /// A new account was created.
    Created {
        /// The account ID.
        user_id: UserId,
        /// The username.
        username: String,
        /// The assigned role.
        role: String,
    },
    /// An account was deleted.
    Deleted {
        /// The account ID.
        user_id: UserId,
        /// The username.
        username: String,
    },
}
