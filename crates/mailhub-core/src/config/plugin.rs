//! Extension configuration.

use serde::{Deserialize, Serialize};

/// Extension (plugin) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Identifiers of the optional extensions to load at startup.
    ///
    /// The `limits` extension is always loaded; listing it here is allowed
    /// but has no effect.
    #[serde(default = "default_enabled")]
    pub enabled: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

impl PluginConfig {
    /// Returns whether the given extension is enabled.
    pub fn is_enabled(&self, extension_id: &str) -> bool {
        self.enabled.iter().any(|id| id == extension_id)
    }
}

fn default_enabled() -> Vec<String> {
    vec!["postfix_relay_domains".to_string()]
}
