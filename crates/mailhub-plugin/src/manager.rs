//! Extension manager: phased boot and shutdown of all extensions.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use mailhub_core::error::AppError;
use mailhub_core::events::{DomainEvent, SystemEvent};
use mailhub_core::result::AppResult;

use crate::hooks::dispatcher::HookDispatcher;
use crate::hooks::registry::HookRegistry;
use crate::registry::{Extension, ExtensionInfo, ExtensionRegistry};

/// Manages the lifecycle of all extensions.
#[derive(Debug)]
pub struct ExtensionManager {
    extension_registry: Arc<ExtensionRegistry>,
    hook_registry: Arc<HookRegistry>,
    hook_dispatcher: Arc<HookDispatcher>,
    /// Load order of the last successful boot. Empty until booted.
    booted: Mutex<Vec<String>>,
}

impl ExtensionManager {
    /// Creates a new extension manager.
    pub fn new() -> Self {
        let hook_registry = Arc::new(HookRegistry::new());
        let hook_dispatcher = Arc::new(HookDispatcher::new(hook_registry.clone()));

        Self {
            extension_registry: Arc::new(ExtensionRegistry::new()),
            hook_registry,
            hook_dispatcher,
            booted: Mutex::new(Vec::new()),
        }
    }

    /// Registers a compiled-in extension. Must happen before [`Self::boot`].
    pub async fn register(&self, extension: Arc<dyn Extension>) -> AppResult<()> {
        if !self.booted.lock().await.is_empty() {
            return Err(AppError::plugin(format!(
                "Cannot register extension '{}' after boot",
                extension.info().id
            )));
        }
        self.extension_registry.register(extension).await
    }

    /// Boots every registered extension and returns the load order.
    ///
    /// All `on_load` calls complete before any handler is subscribed, and
    /// all handlers are subscribed before any `on_ready` runs.
    pub async fn boot(&self) -> AppResult<Vec<String>> {
        let mut booted = self.booted.lock().await;
        if !booted.is_empty() {
            return Err(AppError::plugin("Extensions are already booted"));
        }

        let extensions = self.extension_registry.load_order().await?;
        let order: Vec<String> = extensions.iter().map(|e| e.info().id).collect();
        info!(order = ?order, "Booting extensions");

        for extension in &extensions {
            let id = extension.info().id;
            extension.on_load().await.map_err(|e| {
                error!(extension = %id, error = %e, "Extension load failed");
                e
            })?;
        }

        for extension in &extensions {
            for (hook, handler) in extension.handlers() {
                self.hook_registry.register(hook, handler).await;
            }
        }

        for extension in &extensions {
            let id = extension.info().id;
            extension.on_ready().await.map_err(|e| {
                error!(extension = %id, error = %e, "Extension start failed");
                e
            })?;
        }

        for id in &order {
            self.announce_loaded(id).await?;
        }

        info!(count = order.len(), "Extensions booted");
        *booted = order.clone();
        Ok(order)
    }

    /// Publishes `InitialDataLoaded` for `id` to the extensions depending on it.
    pub async fn announce_loaded(&self, id: &str) -> AppResult<()> {
        let dependents = self.extension_registry.dependents_of(id).await;
        if dependents.is_empty() {
            return Ok(());
        }

        info!(extension = %id, dependents = ?dependents, "Announcing initial data loaded");
        let event = DomainEvent::system(
            SystemEvent::InitialDataLoaded {
                extension: id.to_string(),
            }
            .into(),
        );
        self.hook_dispatcher.publish_to(event, &dependents).await?;
        Ok(())
    }

    /// Unsubscribes every extension's handlers, in reverse load order.
    pub async fn shutdown(&self) {
        let mut booted = self.booted.lock().await;
        for id in booted.iter().rev() {
            self.hook_registry.unregister_plugin(id).await;
        }
        booted.clear();
        info!("Extensions shut down");
    }

    /// Returns whether [`Self::boot`] completed.
    pub async fn is_booted(&self) -> bool {
        !self.booted.lock().await.is_empty()
    }

    /// Returns the hook dispatcher for publishing events.
    pub fn dispatcher(&self) -> &Arc<HookDispatcher> {
        &self.hook_dispatcher
    }

    /// Returns the hook registry.
    pub fn hook_registry(&self) -> &Arc<HookRegistry> {
        &self.hook_registry
    }

    /// Lists registered extensions.
    pub async fn list_extensions(&self) -> Vec<ExtensionInfo> {
        self.extension_registry.list().await
    }
}

impl Default for ExtensionManager {
    fn default() -> Self {
        Self::new()
    }
}
