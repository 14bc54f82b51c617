//! Extension registry: stores extension instances and resolves their load order.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;

use crate::hooks::definitions::HookPoint;
use crate::hooks::registry::HookHandler;

/// Metadata about an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Unique extension identifier, e.g. `postfix_relay_domains`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Description.
    pub description: String,
    /// Extensions that must be loaded before this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Trait that all extensions implement.
///
/// Boot runs in phases across all extensions, in dependency order:
/// 1. [`Extension::on_load`] for every extension (registers limit kinds).
/// 2. Every extension's [`Extension::handlers`] are subscribed.
/// 3. [`Extension::on_ready`] for every extension.
/// 4. `InitialDataLoaded` is announced for each extension to its dependents.
#[async_trait]
pub trait Extension: Send + Sync + std::fmt::Debug {
    /// Returns extension metadata.
    fn info(&self) -> ExtensionInfo;

    /// Called once while the registration phase is open.
    async fn on_load(&self) -> AppResult<()> {
        Ok(())
    }

    /// Called once every extension has loaded.
    async fn on_ready(&self) -> AppResult<()> {
        Ok(())
    }

    /// Handlers to subscribe, keyed by hook point.
    fn handlers(&self) -> Vec<(HookPoint, Arc<dyn HookHandler>)>;
}

/// Registry of all known extensions.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    extensions: RwLock<HashMap<String, Arc<dyn Extension>>>,
    /// IDs in registration order, used to break ties in the load order.
    order: RwLock<Vec<String>>,
}

impl ExtensionRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extension.
    pub async fn register(&self, extension: Arc<dyn Extension>) -> AppResult<()> {
        let info = extension.info();

        let mut extensions = self.extensions.write().await;
        if extensions.contains_key(&info.id) {
            return Err(AppError::conflict(format!(
                "Extension '{}' is already registered",
                info.id
            )));
        }

        info!(
            extension = %info.id,
            name = %info.name,
            version = %info.version,
            depends_on = ?info.depends_on,
            "Registering extension"
        );

        extensions.insert(info.id.clone(), extension);
        self.order.write().await.push(info.id);
        Ok(())
    }

    /// Gets an extension by ID.
    pub async fn get(&self, id: &str) -> Option<Arc<dyn Extension>> {
        self.extensions.read().await.get(id).cloned()
    }

    /// Checks whether an extension is registered.
    pub async fn contains(&self, id: &str) -> bool {
        self.extensions.read().await.contains_key(id)
    }

    /// Returns the number of registered extensions.
    pub async fn count(&self) -> usize {
        self.extensions.read().await.len()
    }

    /// Lists extension metadata in registration order.
    pub async fn list(&self) -> Vec<ExtensionInfo> {
        let extensions = self.extensions.read().await;
        self.order
            .read()
            .await
            .iter()
            .filter_map(|id| extensions.get(id).map(|e| e.info()))
            .collect()
    }

    /// IDs of the extensions that declare a dependency on `id`.
    pub async fn dependents_of(&self, id: &str) -> Vec<String> {
        self.list()
            .await
            .into_iter()
            .filter(|info| info.depends_on.iter().any(|dep| dep == id))
            .map(|info| info.id)
            .collect()
    }

    /// Resolves a load order in which every extension comes after its
    /// dependencies.
    ///
    /// Among extensions whose dependencies are satisfied, registration
    /// order decides, so the result is deterministic.
    pub async fn load_order(&self) -> AppResult<Vec<Arc<dyn Extension>>> {
        let infos = self.list().await;

        for info in &infos {
            if let Some(missing) = info
                .depends_on
                .iter()
                .find(|dep| !infos.iter().any(|other| &other.id == *dep))
            {
                return Err(AppError::plugin(format!(
                    "Extension '{}' depends on '{}', which is not registered",
                    info.id, missing
                )));
            }
        }

        let mut loaded: BTreeSet<&str> = BTreeSet::new();
        let mut ordered: Vec<&str> = Vec::with_capacity(infos.len());

        while ordered.len() < infos.len() {
            let next = infos.iter().find(|info| {
                !loaded.contains(info.id.as_str())
                    && info.depends_on.iter().all(|dep| loaded.contains(dep.as_str()))
            });

            let Some(next) = next else {
                let stuck: Vec<&str> = infos
                    .iter()
                    .map(|info| info.id.as_str())
                    .filter(|id| !loaded.contains(id))
                    .collect();
                return Err(AppError::plugin(format!(
                    "Dependency cycle between extensions: {}",
                    stuck.join(", ")
                )));
            };

            loaded.insert(next.id.as_str());
            ordered.push(next.id.as_str());
        }

        let extensions = self.extensions.read().await;
        Ok(ordered
            .into_iter()
            .filter_map(|id| extensions.get(id).cloned())
            .collect())
    }
}
