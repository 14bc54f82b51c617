//! Limit kind registry.
//!
//! Extensions register the resource kinds they count while the registry is
//! open. Once every extension has loaded, the registry is sealed: further
//! registrations fail and accounting becomes available. Accounting before
//! the seal fails with [`LimitError::RegistryNotSealed`], so no call is ever
//! served against a partially populated catalog.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use mailhub_core::error::LimitError;
use mailhub_core::types::limit::{LimitKind, LimitMax};

/// A registered limit kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitKindInfo {
    /// Kind name.
    pub name: LimitKind,
    /// Default maximum for newly created limits.
    pub default_max: LimitMax,
    /// Human-readable label.
    pub label: String,
    /// Help text of the default-maximum parameter.
    #[serde(default)]
    pub help_text: String,
    /// Extension that registered the kind.
    #[serde(default)]
    pub extension: String,
}

impl LimitKindInfo {
    /// Creates a kind description.
    pub fn new(name: impl Into<LimitKind>, default_max: LimitMax, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_max,
            label: label.into(),
            help_text: String::new(),
            extension: String::new(),
        }
    }

    /// Sets the help text.
    pub fn with_help_text(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = help_text.into();
        self
    }

    /// Sets the registering extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Kinds in registration order.
    kinds: Vec<LimitKindInfo>,
    sealed: bool,
}

/// Catalog of limit kinds.
#[derive(Debug, Default)]
pub struct KindRegistry {
    state: RwLock<RegistryState>,
}

impl KindRegistry {
    /// Creates an open, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a kind with a default maximum and a label.
    pub async fn register_kind(
        &self,
        name: impl Into<LimitKind>,
        default_max: LimitMax,
        label: impl Into<String>,
    ) -> Result<bool, LimitError> {
        self.register(LimitKindInfo::new(name, default_max, label))
            .await
    }

    /// Registers a kind.
    ///
    /// Returns `true` if the kind was added, `false` if an identical
    /// registration already existed.
    pub async fn register(&self, info: LimitKindInfo) -> Result<bool, LimitError> {
        let mut state = self.state.write().await;

        if state.sealed {
            return Err(LimitError::RegistrySealed {
                name: info.name.to_string(),
            });
        }

        if let Some(existing) = state.kinds.iter().find(|k| k.name == info.name) {
            if existing.default_max != info.default_max {
                return Err(LimitError::DuplicateKind {
                    name: info.name.to_string(),
                    existing: existing.default_max.as_raw(),
                    requested: info.default_max.as_raw(),
                });
            }
            debug!(kind = %info.name, "Limit kind already registered");
            return Ok(false);
        }

        info!(
            kind = %info.name,
            default_max = %info.default_max,
            extension = %info.extension,
            "Limit kind registered"
        );
        state.kinds.push(info);
        Ok(true)
    }

    /// Closes the registration phase. Returns the number of kinds.
    pub async fn seal(&self) -> usize {
        let mut state = self.state.write().await;
        if !state.sealed {
            state.sealed = true;
            info!(kinds = state.kinds.len(), "Limit kind registry sealed");
        }
        state.kinds.len()
    }

    /// Returns whether the registry is sealed.
    pub async fn is_sealed(&self) -> bool {
        self.state.read().await.sealed
    }

    /// Fails unless the registry is sealed.
    pub async fn ensure_sealed(&self) -> Result<(), LimitError> {
        if self.is_sealed().await {
            Ok(())
        } else {
            Err(LimitError::RegistryNotSealed)
        }
    }

    /// Lists kinds in registration order.
    pub async fn list_kinds(&self) -> Vec<LimitKindInfo> {
        self.state.read().await.kinds.clone()
    }

    /// Looks a kind up by name.
    pub async fn get(&self, name: &str) -> Option<LimitKindInfo> {
        self.state
            .read()
            .await
            .kinds
            .iter()
            .find(|k| k.name.as_str() == name)
            .cloned()
    }

    /// Returns whether a kind is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.get(name).await.is_some()
    }

    /// Looks up a kind for accounting: the registry must be sealed and the
    /// kind registered.
    pub async fn require(&self, kind: &LimitKind) -> Result<LimitKindInfo, LimitError> {
        let state = self.state.read().await;
        if !state.sealed {
            return Err(LimitError::RegistryNotSealed);
        }
        state
            .kinds
            .iter()
            .find(|k| &k.name == kind)
            .cloned()
            .ok_or_else(|| LimitError::UnknownKind {
                name: kind.to_string(),
            })
    }
}
