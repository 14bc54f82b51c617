//! Domain events emitted by MailHub operations.
//!
//! Events are published on the extension event bus and consumed by
//! extension handlers (limit accounting, parameter collection, ...).
//! Every topic is a variant of [`EventPayload`], so a misspelled topic is
//! a compile error instead of a silently ignored string.

pub mod account;
pub mod limits;
pub mod relay_domain;
pub mod system;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::id::UserId;

pub use account::AccountEvent;
pub use limits::LimitsEvent;
pub use relay_domain::{RelayDomainAliasRef, RelayDomainEvent, RelayDomainRef};
pub use system::SystemEvent;

/// Wrapper for all domain events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The account that caused the event (if applicable).
    pub actor_id: Option<UserId>,
    /// The event payload.
    pub payload: EventPayload,
}

/// Union of all domain event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event")]
pub enum EventPayload {
    /// An account-related event.
    Account(AccountEvent),
    /// A relay-domain-related event.
    RelayDomain(RelayDomainEvent),
    /// A limit-related query.
    Limits(LimitsEvent),
    /// A system-level event.
    System(SystemEvent),
}

impl DomainEvent {
    /// Create a new domain event.
    pub fn new(actor_id: Option<UserId>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor_id,
            payload,
        }
    }

    /// Create an event with no acting account.
    pub fn system(payload: EventPayload) -> Self {
        Self::new(None, payload)
    }
}

impl From<AccountEvent> for EventPayload {
    fn from(event: AccountEvent) -> Self {
        Self::Account(event)
    }
}

impl From<RelayDomainEvent> for EventPayload {
    fn from(event: RelayDomainEvent) -> Self {
        Self::RelayDomain(event)
    }
}

impl From<LimitsEvent> for EventPayload {
    fn from(event: LimitsEvent) -> Self {
        Self::Limits(event)
    }
}

impl From<SystemEvent> for EventPayload {
    fn from(event: SystemEvent) -> Self {
        Self::System(event)
    }
}
