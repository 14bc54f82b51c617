//! Relay domains extension: registers with the MailHub extension system.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use mailhub_core::result::AppResult;
use mailhub_core::types::limit::LimitMax;
use mailhub_limits::{LIMITS_EXTENSION_ID, LimitAccounting, LimitKindInfo};
use mailhub_plugin::hooks::definitions::HookPoint;
use mailhub_plugin::hooks::registry::HookHandler;
use mailhub_plugin::registry::{Extension, ExtensionInfo};

use crate::hooks::{
    AliasCreatedHook, AliasDeletedHook, ExtraParametersHook, InitialDataLoadedHook, Release,
    RelayDomainCreatedHook, RelayDomainDeletedHook,
};

/// Identifier of the relay domains extension.
pub const RELAY_DOMAINS_EXTENSION_ID: &str = "postfix_relay_domains";

/// Limit kind counting relay domains.
pub const RELAY_DOMAINS_LIMIT: &str = "relay_domains_limit";

/// Limit kind counting relay domain aliases.
pub const RELAY_DOMAIN_ALIASES_LIMIT: &str = "relay_domain_aliases_limit";

/// Relay domains extension
#[derive(Debug)]
pub struct RelayDomainsExtension {
    accounting: Arc<LimitAccounting>,
}

impl RelayDomainsExtension {
    /// Create a new relay domains extension
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }

    /// The limit kinds this extension counts.
    pub fn limit_kinds() -> Vec<LimitKindInfo> {
        vec![
            LimitKindInfo::new(RELAY_DOMAINS_LIMIT, LimitMax::Fixed(0), "Relay domains")
                .with_help_text("Maximum number of allowed relay domains for a new administrator")
                .with_extension(RELAY_DOMAINS_EXTENSION_ID),
            LimitKindInfo::new(
                RELAY_DOMAIN_ALIASES_LIMIT,
                LimitMax::Fixed(0),
                "Relay domain aliases",
            )
            .with_help_text(
                "Maximum number of allowed relay domain aliases for a new administrator",
            )
            .with_extension(RELAY_DOMAINS_EXTENSION_ID),
        ]
    }
}

#[async_trait]
impl Extension for RelayDomainsExtension {
    fn info(&self) -> ExtensionInfo {
        ExtensionInfo {
            id: RELAY_DOMAINS_EXTENSION_ID.to_string(),
            name: "Relay domains".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Relay domains and their aliases, counted against admin limits"
                .to_string(),
            depends_on: vec![LIMITS_EXTENSION_ID.to_string()],
        }
    }

    async fn on_load(&self) -> AppResult<()> {
        for kind in Self::limit_kinds() {
            self.accounting.kinds().register(kind).await?;
        }
        info!("Relay domain limit kinds registered");
        Ok(())
    }

    fn handlers(&self) -> Vec<(HookPoint, Arc<dyn HookHandler>)> {
        let release = Arc::new(Release::new(self.accounting.clone()));

        let loaded: Arc<dyn HookHandler> =
            Arc::new(InitialDataLoadedHook::new(self.accounting.clone()));
        let created: Arc<dyn HookHandler> =
            Arc::new(RelayDomainCreatedHook::new(self.accounting.clone()));
        let deleted: Arc<dyn HookHandler> = Arc::new(RelayDomainDeletedHook::new(release.clone()));
        let alias_created: Arc<dyn HookHandler> =
            Arc::new(AliasCreatedHook::new(self.accounting.clone()));
        let alias_deleted: Arc<dyn HookHandler> = Arc::new(AliasDeletedHook::new(release));
        let parameters: Arc<dyn HookHandler> =
            Arc::new(ExtraParametersHook::new(self.accounting.clone()));

        vec![
            (HookPoint::InitialDataLoaded, loaded),
            (HookPoint::RelayDomainCreated, created),
            (HookPoint::RelayDomainDeleted, deleted),
            (HookPoint::RelayDomainAliasCreated, alias_created),
            (HookPoint::RelayDomainAliasDeleted, alias_deleted),
            (HookPoint::GetExtraParameters, parameters),
        ]
    }
}
