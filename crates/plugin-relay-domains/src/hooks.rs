//! Hook implementations for the relay domains extension.
//!
//! Creation hooks record each object against its creator and increment the
//! creator's counter, propagating failures so a domain is never created
//! without being counted. A replayed creation is not counted twice.
//! Deletion hooks release each object from the owner it was recorded
//! against; an object whose owner cannot be resolved is skipped and the
//! rest of the cascade proceeds.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use mailhub_core::error::AppError;
use mailhub_core::events::{EventPayload, RelayDomainAliasRef, RelayDomainEvent, SystemEvent};
use mailhub_core::result::AppResult;
use mailhub_core::traits::owner::OwnedObject;
use mailhub_core::types::limit::LimitKind;
use mailhub_core::types::parameter::ParameterLevel;
use mailhub_limits::{LIMITS_EXTENSION_ID, LimitAccounting};
use mailhub_plugin::hooks::definitions::{HookPayload, HookResult};
use mailhub_plugin::hooks::registry::HookHandler;

use crate::extension::{
    RELAY_DOMAIN_ALIASES_LIMIT, RELAY_DOMAINS_EXTENSION_ID, RELAY_DOMAINS_LIMIT,
    RelayDomainsExtension,
};

fn unexpected(payload: &HookPayload) -> AppError {
    AppError::plugin(format!(
        "{RELAY_DOMAINS_EXTENSION_ID}: unexpected payload on hook {}",
        payload.hook
    ))
}

/// Releases the usage of deleted objects from their owners' counters.
#[derive(Debug)]
pub struct Release {
    accounting: Arc<LimitAccounting>,
}

impl Release {
    /// Create a new release helper.
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }

    /// Detaches `object` and decrements `kind` for its recorded owner.
    /// Returns `false` if the object was skipped.
    pub async fn release(&self, object: OwnedObject, kind: &LimitKind) -> bool {
        match self.accounting.detach(&object, kind).await {
            Ok(Some(detached)) => {
                debug!(object = %object, owner = %detached.owner, kind = %kind, "Usage released");
                true
            }
            Ok(None) => {
                warn!(object = %object, kind = %kind, "Object has no owner, usage not released");
                false
            }
            Err(e) => {
                warn!(object = %object, kind = %kind, error = %e, "Release failed, usage not released");
                false
            }
        }
    }

    /// Releases every alias independently. Returns how many were released.
    pub async fn release_aliases(&self, aliases: &[RelayDomainAliasRef]) -> usize {
        let kind = LimitKind::new(RELAY_DOMAIN_ALIASES_LIMIT);
        let mut released = 0;
        for alias in aliases {
            if self
                .release(OwnedObject::RelayDomainAlias(alias.id), &kind)
                .await
            {
                released += 1;
            }
        }
        released
    }
}

/// Hook handler for initial_data_loaded: backfill existing pools once the
/// limits extension is loaded.
#[derive(Debug)]
pub struct InitialDataLoadedHook {
    accounting: Arc<LimitAccounting>,
}

impl InitialDataLoadedHook {
    /// Create a new initial_data_loaded hook handler
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }
}

#[async_trait]
impl HookHandler for InitialDataLoadedHook {
    async fn handle(&self, payload: &HookPayload) -> AppResult<HookResult> {
        let EventPayload::System(SystemEvent::InitialDataLoaded { extension }) = payload.payload()
        else {
            return Err(unexpected(payload));
        };

        if extension != LIMITS_EXTENSION_ID {
            return Ok(HookResult::none(RELAY_DOMAINS_EXTENSION_ID));
        }

        let created = self.accounting.backfill().await?;
        info!(created = created, "Relay domain limits added to existing pools");
        Ok(HookResult::none(RELAY_DOMAINS_EXTENSION_ID))
    }

    fn plugin_id(&self) -> &str {
        RELAY_DOMAINS_EXTENSION_ID
    }
}

/// Hook handler for relay_domain_created: count the domain for its creator.
#[derive(Debug)]
pub struct RelayDomainCreatedHook {
    accounting: Arc<LimitAccounting>,
}

impl RelayDomainCreatedHook {
    /// Create a new relay_domain_created hook handler
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }
}

#[async_trait]
impl HookHandler for RelayDomainCreatedHook {
    async fn handle(&self, payload: &HookPayload) -> AppResult<HookResult> {
        let EventPayload::RelayDomain(RelayDomainEvent::Created { created_by, domain }) =
            payload.payload()
        else {
            return Err(unexpected(payload));
        };

        let counted = self
            .accounting
            .attach(
                &OwnedObject::RelayDomain(domain.id),
                created_by,
                &LimitKind::new(RELAY_DOMAINS_LIMIT),
            )
            .await?;
        if let Some(usage) = counted {
            debug!(domain = %domain.name, owner = %created_by, current = usage.current, "Relay domain counted");
        }
        Ok(HookResult::none(RELAY_DOMAINS_EXTENSION_ID))
    }

    fn plugin_id(&self) -> &str {
        RELAY_DOMAINS_EXTENSION_ID
    }
}

/// Hook handler for relay_domain_deleted: release the domain, then each of
/// its aliases.
#[derive(Debug)]
pub struct RelayDomainDeletedHook {
    release: Arc<Release>,
}

impl RelayDomainDeletedHook {
    /// Create a new relay_domain_deleted hook handler
    pub fn new(release: Arc<Release>) -> Self {
        Self { release }
    }
}

#[async_trait]
impl HookHandler for RelayDomainDeletedHook {
    async fn handle(&self, payload: &HookPayload) -> AppResult<HookResult> {
        let EventPayload::RelayDomain(RelayDomainEvent::Deleted { domain }) = payload.payload()
        else {
            return Err(unexpected(payload));
        };

        self.release
            .release(
                OwnedObject::RelayDomain(domain.id),
                &LimitKind::new(RELAY_DOMAINS_LIMIT),
            )
            .await;
        let released = self.release.release_aliases(&domain.aliases).await;

        debug!(
            domain = %domain.name,
            aliases = domain.aliases.len(),
            released = released,
            "Relay domain usage released"
        );
        Ok(HookResult::none(RELAY_DOMAINS_EXTENSION_ID))
    }

    fn plugin_id(&self) -> &str {
        RELAY_DOMAINS_EXTENSION_ID
    }
}

/// Hook handler for relay_domain_alias_created: count the alias for its creator.
#[derive(Debug)]
pub struct AliasCreatedHook {
    accounting: Arc<LimitAccounting>,
}

impl AliasCreatedHook {
    /// Create a new relay_domain_alias_created hook handler
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }
}

#[async_trait]
impl HookHandler for AliasCreatedHook {
    async fn handle(&self, payload: &HookPayload) -> AppResult<HookResult> {
        let EventPayload::RelayDomain(RelayDomainEvent::AliasCreated { created_by, alias }) =
            payload.payload()
        else {
            return Err(unexpected(payload));
        };

        let counted = self
            .accounting
            .attach(
                &OwnedObject::RelayDomainAlias(alias.id),
                created_by,
                &LimitKind::new(RELAY_DOMAIN_ALIASES_LIMIT),
            )
            .await?;
        if let Some(usage) = counted {
            debug!(alias = %alias.name, owner = %created_by, current = usage.current, "Relay domain alias counted");
        }
        Ok(HookResult::none(RELAY_DOMAINS_EXTENSION_ID))
    }

    fn plugin_id(&self) -> &str {
        RELAY_DOMAINS_EXTENSION_ID
    }
}

/// Hook handler for relay_domain_alias_deleted: release each alias.
#[derive(Debug)]
pub struct AliasDeletedHook {
    release: Arc<Release>,
}

impl AliasDeletedHook {
    /// Create a new relay_domain_alias_deleted hook handler
    pub fn new(release: Arc<Release>) -> Self {
        Self { release }
    }
}

#[async_trait]
impl HookHandler for AliasDeletedHook {
    async fn handle(&self, payload: &HookPayload) -> AppResult<HookResult> {
        let EventPayload::RelayDomain(RelayDomainEvent::AliasDeleted { aliases }) =
            payload.payload()
        else {
            return Err(unexpected(payload));
        };

        self.release.release_aliases(aliases).await;
        Ok(HookResult::none(RELAY_DOMAINS_EXTENSION_ID))
    }

    fn plugin_id(&self) -> &str {
        RELAY_DOMAINS_EXTENSION_ID
    }
}

/// Hook handler for get_extra_parameters: the default maxima of the
/// relay domain kinds, on the admin form of the limits application.
#[derive(Debug)]
pub struct ExtraParametersHook {
    accounting: Arc<LimitAccounting>,
}

impl ExtraParametersHook {
    /// Create a new get_extra_parameters hook handler
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }
}

#[async_trait]
impl HookHandler for ExtraParametersHook {
    async fn handle(&self, payload: &HookPayload) -> AppResult<HookResult> {
        let EventPayload::System(SystemEvent::GetExtraParameters { app, level }) =
            payload.payload()
        else {
            return Err(unexpected(payload));
        };

        if app != LIMITS_EXTENSION_ID || *level != ParameterLevel::Admin {
            return Ok(HookResult::parameters(RELAY_DOMAINS_EXTENSION_ID, Vec::new()));
        }

        let parameters = self.accounting.parameters();
        let mut fields = Vec::new();
        for kind in RelayDomainsExtension::limit_kinds() {
            let registered = self.accounting.kinds().get(kind.name.as_str()).await;
            let info = registered.unwrap_or(kind);
            fields.push(parameters.field(&info).await);
        }
        Ok(HookResult::parameters(RELAY_DOMAINS_EXTENSION_ID, fields))
    }

    fn plugin_id(&self) -> &str {
        RELAY_DOMAINS_EXTENSION_ID
    }
}
