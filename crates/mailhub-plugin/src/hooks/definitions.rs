//! Hook point definitions with typed payloads.

use serde::{Deserialize, Serialize};

use mailhub_core::events::{
    AccountEvent, DomainEvent, EventPayload, LimitsEvent, RelayDomainEvent, SystemEvent,
};
use mailhub_core::types::id::UserId;
use mailhub_core::types::limit::Admission;
use mailhub_core::types::parameter::ParameterField;

/// Enumeration of all hook points in the system.
///
/// Each [`EventPayload`] variant maps to exactly one hook point, see
/// [`HookPoint::of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    // ── Lifecycle ──
    /// An extension finished loading its initial data.
    InitialDataLoaded,

    // ── Accounts ──
    /// An account was created.
    AccountCreated,
    /// An account was deleted.
    AccountDeleted,

    // ── Limits ──
    /// Admission check before a resource is created.
    CanCreate,

    // ── Relay domains ──
    /// A relay domain was created.
    RelayDomainCreated,
    /// A relay domain is being deleted.
    RelayDomainDeleted,
    /// A relay domain alias was created.
    RelayDomainAliasCreated,
    /// One or more relay domain aliases were deleted.
    RelayDomainAliasDeleted,

    // ── Settings ──
    /// A settings form collects extra parameter fields.
    GetExtraParameters,
}

impl HookPoint {
    /// Returns the string name of this hook point.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialDataLoaded => "initial_data_loaded",
            Self::AccountCreated => "account_created",
            Self::AccountDeleted => "account_deleted",
            Self::CanCreate => "can_create",
            Self::RelayDomainCreated => "relay_domain_created",
            Self::RelayDomainDeleted => "relay_domain_deleted",
            Self::RelayDomainAliasCreated => "relay_domain_alias_created",
            Self::RelayDomainAliasDeleted => "relay_domain_alias_deleted",
            Self::GetExtraParameters => "get_extra_parameters",
        }
    }

    /// Returns the hook point an event is delivered to.
    pub fn of(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::Account(AccountEvent::Created { .. }) => Self::AccountCreated,
            EventPayload::Account(AccountEvent::Deleted { .. }) => Self::AccountDeleted,
            EventPayload::RelayDomain(RelayDomainEvent::Created { .. }) => Self::RelayDomainCreated,
            EventPayload::RelayDomain(RelayDomainEvent::Deleted { .. }) => Self::RelayDomainDeleted,
            EventPayload::RelayDomain(RelayDomainEvent::AliasCreated { .. }) => {
                Self::RelayDomainAliasCreated
            }
            EventPayload::RelayDomain(RelayDomainEvent::AliasDeleted { .. }) => {
                Self::RelayDomainAliasDeleted
            }
            EventPayload::Limits(LimitsEvent::CanCreate { .. }) => Self::CanCreate,
            EventPayload::System(SystemEvent::InitialDataLoaded { .. }) => Self::InitialDataLoaded,
            EventPayload::System(SystemEvent::GetExtraParameters { .. }) => {
                Self::GetExtraParameters
            }
        }
    }

    /// Returns whether this hook fires while objects are being torn down.
    ///
    /// Handler failures on teardown hooks are logged and skipped; on every
    /// other hook they abort the triggering operation.
    pub fn is_teardown(&self) -> bool {
        matches!(
            self,
            Self::AccountDeleted | Self::RelayDomainDeleted | Self::RelayDomainAliasDeleted
        )
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload passed to hook handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookPayload {
    /// The hook point being fired.
    pub hook: HookPoint,
    /// The event that triggered the hook.
    pub event: DomainEvent,
}

impl HookPayload {
    /// Wraps an event, deriving the hook point from its payload.
    pub fn new(event: DomainEvent) -> Self {
        Self {
            hook: HookPoint::of(&event.payload),
            event,
        }
    }

    /// The account that caused the event, if any.
    pub fn actor_id(&self) -> Option<UserId> {
        self.event.actor_id
    }

    /// The typed event payload.
    pub fn payload(&self) -> &EventPayload {
        &self.event.payload
    }
}

/// Data returned by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum HookOutput {
    /// The handler only had side effects.
    None,
    /// Fields contributed to a settings form.
    Parameters(Vec<ParameterField>),
    /// Answer to an admission check.
    Admission(Admission),
}

/// Result returned from a hook handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResult {
    /// Extension ID that produced this result.
    pub plugin_id: String,
    /// Output data from the handler.
    pub output: HookOutput,
}

impl HookResult {
    /// A result without output.
    pub fn none(plugin_id: &str) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            output: HookOutput::None,
        }
    }

    /// A result carrying parameter fields.
    pub fn parameters(plugin_id: &str, fields: Vec<ParameterField>) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            output: HookOutput::Parameters(fields),
        }
    }

    /// A result carrying an admission decision.
    pub fn admission(plugin_id: &str, admission: Admission) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            output: HookOutput::Admission(admission),
        }
    }
}
