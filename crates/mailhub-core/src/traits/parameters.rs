//! Persistence of edited parameter values.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::parameter::ParameterLevel;

/// Stores parameter values changed at runtime, keyed by application and
/// level. Values never edited are absent and fall back to their defaults.
#[async_trait]
pub trait ParameterRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Every stored value of `app` at `level`, by field name.
    async fn load(&self, app: &str, level: ParameterLevel) -> AppResult<HashMap<String, i64>>;

    /// Store one value, replacing any previous one.
    async fn save(&self, app: &str, level: ParameterLevel, name: &str, value: i64)
    -> AppResult<()>;
}
