//! Limit pool entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The set of limits belonging to one administrator.
///
/// A pool is created lazily and is never shared between owners. Deleting
/// it deletes all of its limits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LimitPool {
    /// Pool ID.
    pub id: Uuid,
    /// The owning account.
    pub user_id: Uuid,
    /// When the pool was created.
    pub created_at: Option<DateTime<Utc>>,
}
