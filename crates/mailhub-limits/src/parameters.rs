//! Admin-scope default maxima for limit kinds.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use mailhub_core::config::LimitsConfig;
use mailhub_core::error::LimitError;
use mailhub_core::result::AppResult;
use mailhub_core::traits::parameters::ParameterRepository;
use mailhub_core::types::limit::{LimitKind, LimitMax};
use mailhub_core::types::parameter::{ParameterField, ParameterLevel};

use crate::extension::LIMITS_EXTENSION_ID;
use crate::registry::{KindRegistry, LimitKindInfo};
use crate::store::MemoryParameterRepository;

const PARAMETER_PREFIX: &str = "deflt_";

/// Typed accessor for the `deflt_<kind>` parameters.
///
/// A kind without an override uses the default its extension registered.
/// Values set at runtime are written to the repository and take
/// precedence over `[limits.defaults]` once [`load`](Self::load) ran.
#[derive(Debug)]
pub struct ParameterStore {
    kinds: Arc<KindRegistry>,
    repository: Arc<dyn ParameterRepository>,
    overrides: RwLock<HashMap<LimitKind, LimitMax>>,
}

fn kind_of(name: &str) -> LimitKind {
    LimitKind::new(name.strip_prefix(PARAMETER_PREFIX).unwrap_or(name))
}

impl ParameterStore {
    /// Creates a store without overrides, persisting edits in memory.
    pub fn new(kinds: Arc<KindRegistry>) -> Self {
        Self {
            kinds,
            repository: Arc::new(MemoryParameterRepository::new()),
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store seeded from `[limits.defaults]`.
    ///
    /// Keys may be given as `relay_domains_limit` or `deflt_relay_domains_limit`.
    pub fn from_config(kinds: Arc<KindRegistry>, config: &LimitsConfig) -> Self {
        let overrides = config
            .defaults
            .iter()
            .map(|(name, raw)| (kind_of(name), LimitMax::from(*raw)))
            .collect();

        Self {
            kinds,
            repository: Arc::new(MemoryParameterRepository::new()),
            overrides: RwLock::new(overrides),
        }
    }

    /// Persists edits in `repository` instead of memory.
    pub fn with_repository(mut self, repository: Arc<dyn ParameterRepository>) -> Self {
        self.repository = repository;
        self
    }

    /// Reads the persisted values over the configured ones. Returns how
    /// many were loaded.
    pub async fn load(&self) -> AppResult<usize> {
        let values = self
            .repository
            .load(LIMITS_EXTENSION_ID, ParameterLevel::Admin)
            .await?;

        let mut overrides = self.overrides.write().await;
        for (name, raw) in &values {
            debug!(parameter = %name, value = raw, "Loaded stored default");
            overrides.insert(kind_of(name), LimitMax::from(*raw));
        }
        Ok(values.len())
    }

    /// Effective default maximum of a registered kind.
    pub async fn default_max(&self, info: &LimitKindInfo) -> LimitMax {
        self.overrides
            .read()
            .await
            .get(&info.name)
            .copied()
            .unwrap_or(info.default_max)
    }

    /// Changes and persists the default maximum of a registered kind.
    ///
    /// Only limits created afterwards pick it up.
    pub async fn set_default_max(&self, kind: &LimitKind, max: LimitMax) -> AppResult<()> {
        if !self.kinds.contains(kind.as_str()).await {
            return Err(LimitError::UnknownKind {
                name: kind.to_string(),
            }
            .into());
        }

        self.repository
            .save(
                LIMITS_EXTENSION_ID,
                ParameterLevel::Admin,
                &kind.parameter_name(),
                max.as_raw(),
            )
            .await?;
        self.overrides.write().await.insert(kind.clone(), max);
        info!(parameter = %kind.parameter_name(), value = %max, "Default limit updated");
        Ok(())
    }

    /// The settings field for one kind.
    pub async fn field(&self, info: &LimitKindInfo) -> ParameterField {
        ParameterField {
            name: info.name.parameter_name(),
            label: info.label.clone(),
            help_text: info.help_text.clone(),
            initial: self.default_max(info).await.as_raw(),
        }
    }

    /// The settings fields of every registered kind, in registration order.
    pub async fn fields(&self) -> Vec<ParameterField> {
        let mut fields = Vec::new();
        for info in self.kinds.list_kinds().await {
            fields.push(self.field(&info).await);
        }
        fields
    }

    /// Changes a default by its field name, `deflt_<kind>` or `<kind>`.
    pub async fn set_parameter(&self, name: &str, raw: i64) -> AppResult<()> {
        self.set_default_max(&kind_of(name), LimitMax::from(raw)).await
    }

    /// Overridden kinds that no extension registered.
    pub async fn unknown_overrides(&self) -> Vec<LimitKind> {
        let mut unknown = Vec::new();
        for kind in self.overrides.read().await.keys() {
            if !self.kinds.contains(kind.as_str()).await {
                unknown.push(kind.clone());
            }
        }
        unknown.sort();
        unknown
    }
}
