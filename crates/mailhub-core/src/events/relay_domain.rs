//! Relay domain domain events.
//!
//! Payloads carry snapshots rather than live rows: a `Deleted` event is
//! published while the object is being removed, so its dependents are
//! captured up front.

use serde::{Deserialize, Serialize};

use crate::types::id::{RelayDomainAliasId, RelayDomainId, UserId};

/// Snapshot of a relay domain and its aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayDomainRef {
    /// The relay domain ID.
    pub id: RelayDomainId,
    /// The domain name.
    pub name: String,
    /// Aliases pointing at this domain.
    #[serde(default)]
    pub aliases: Vec<RelayDomainAliasRef>,
}

/// Snapshot of a relay domain alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayDomainAliasRef {
    /// The alias ID.
    pub id: RelayDomainAliasId,
    /// The alias name.
    pub name: String,
    /// The relay domain it points at.
    pub target: RelayDomainId,
}

/// Events related to relay domains and their aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayDomainEvent {
    /// A relay domain was created.
    Created {
        /// The account that created it.
        created_by: UserId,
        /// The new domain.
        domain: RelayDomainRef,
    },
    /// A relay domain is being deleted, together with its aliases.
    Deleted {
        /// The deleted domain.
        domain: RelayDomainRef,
    },
    /// A relay domain alias was created.
    AliasCreated {
        /// The account that created it.
        created_by: UserId,
        /// The new alias.
        alias: RelayDomainAliasRef,
    },
    /// One or more relay domain aliases were deleted.
    AliasDeleted {
        /// The deleted aliases.
        aliases: Vec<RelayDomainAliasRef>,
    },
}
