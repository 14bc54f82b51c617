//! Limit entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use mailhub_core::types::limit::{LimitKind, LimitMax, LimitUsage};

/// One counter in a limit pool.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Limit {
    /// Limit ID.
    pub id: Uuid,
    /// Owning pool.
    pub pool_id: Uuid,
    /// Limit kind name.
    pub name: String,
    /// Current usage. Never negative.
    pub current_value: i32,
    /// Maximum allowed. Negative means unlimited.
    pub max_value: i32,
    /// When the limit was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the counter last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Limit {
    /// Converts the row into a usage value.
    pub fn usage(&self) -> LimitUsage {
        LimitUsage::new(
            LimitKind::new(self.name.clone()),
            u32::try_from(self.current_value).unwrap_or(0),
            LimitMax::from(i64::from(self.max_value)),
        )
    }

    /// Whether the counter sits at zero.
    pub fn is_empty(&self) -> bool {
        self.current_value <= 0
    }
}
