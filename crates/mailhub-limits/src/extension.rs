//! The `limits` extension.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use mailhub_core::result::AppResult;
use mailhub_plugin::hooks::definitions::HookPoint;
use mailhub_plugin::hooks::registry::HookHandler;
use mailhub_plugin::registry::{Extension, ExtensionInfo};

use crate::accounting::LimitAccounting;
use crate::hooks::{AccountCreatedHook, AccountDeletedHook, CanCreateHook};

/// Identifier of the limits extension. Also the application name of its
/// settings form.
pub const LIMITS_EXTENSION_ID: &str = "limits";

/// Owns the limit kind registry lifecycle and answers account and
/// admission events.
///
/// Extensions that count resources declare a dependency on it, register
/// their kinds in `on_load`, and are told when the registry is complete
/// through `InitialDataLoaded`.
#[derive(Debug)]
pub struct LimitsExtension {
    accounting: Arc<LimitAccounting>,
}

impl LimitsExtension {
    /// Create a new limits extension.
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }

    /// The accounting service.
    pub fn accounting(&self) -> &Arc<LimitAccounting> {
        &self.accounting
    }
}

#[async_trait]
impl Extension for LimitsExtension {
    fn info(&self) -> ExtensionInfo {
        ExtensionInfo {
            id: LIMITS_EXTENSION_ID.to_string(),
            name: "Limits".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Per-administrator resource limits".to_string(),
            depends_on: Vec::new(),
        }
    }

    /// Seals the kind registry: every extension has registered its kinds
    /// by the time any `on_ready` runs.
    async fn on_ready(&self) -> AppResult<()> {
        let kinds = self.accounting.kinds().seal().await;
        let stored = self.accounting.parameters().load().await?;

        for kind in self.accounting.parameters().unknown_overrides().await {
            warn!(
                kind = %kind,
                "Configured default for a limit kind no extension registered"
            );
        }

        info!(kinds = kinds, stored_defaults = stored, "Limits extension ready");
        Ok(())
    }

    fn handlers(&self) -> Vec<(HookPoint, Arc<dyn HookHandler>)> {
        let created: Arc<dyn HookHandler> =
            Arc::new(AccountCreatedHook::new(self.accounting.clone()));
        let deleted: Arc<dyn HookHandler> =
            Arc::new(AccountDeletedHook::new(self.accounting.clone()));
        let can_create: Arc<dyn HookHandler> =
            Arc::new(CanCreateHook::new(self.accounting.clone()));

        vec![
            (HookPoint::AccountCreated, created),
            (HookPoint::AccountDeleted, deleted),
            (HookPoint::CanCreate, can_create),
        ]
    }
}
