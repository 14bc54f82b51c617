//! Limit store trait for per-owner usage counters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::traits::owner::{OwnedObject, OwnerResolver};
use crate::types::id::UserId;
use crate::types::limit::{Admission, LimitKind, LimitMax, LimitUsage};

/// A limit to create when it does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSeed {
    /// The limit kind.
    pub kind: LimitKind,
    /// Maximum assigned to a newly created limit. Existing limits keep theirs.
    pub max: LimitMax,
}

impl LimitSeed {
    /// Creates a seed.
    pub fn new(kind: LimitKind, max: LimitMax) -> Self {
        Self { kind, max }
    }
}

/// Result of a decrement on an existing limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decrement {
    /// Usage after the decrement.
    pub usage: LimitUsage,
    /// `true` when the counter was already at zero and stayed there.
    pub clamped: bool,
}

/// An object removed from the ownership ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detached {
    /// The owner the object was recorded against.
    pub owner: UserId,
    /// The decrement applied to the owner's counter, `None` if the owner
    /// had no such limit.
    pub decrement: Option<Decrement>,
}

/// Number of persisted rows, for reconciliation and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreCounts {
    /// Number of limit pools.
    pub pools: u64,
    /// Number of limits across all pools.
    pub limits: u64,
}

/// Persistent record of (owner, kind) → usage, and of which owner each
/// counted object was charged to.
///
/// Implementations must serialize every mutation of a given owner's pool
/// (row lock or equivalent) so concurrent creations and deletions for the
/// same owner never lose an update. The ownership record and the counter
/// change of [`attach`](Self::attach) and [`detach`](Self::detach) commit
/// together or not at all. Two implementations are provided:
/// - PostgreSQL (`SELECT ... FOR UPDATE` on the pool row, one transaction)
/// - In-memory (using `tokio::sync::Mutex`)
#[async_trait]
pub trait LimitStore: OwnerResolver {
    /// Read one limit. Never creates state.
    async fn usage(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Option<LimitUsage>>;

    /// Read every limit of an owner's pool, or `None` if the owner has no pool.
    async fn pool_usage(&self, owner: &UserId) -> AppResult<Option<Vec<LimitUsage>>>;

    /// Add one to a counter, creating the pool and the limit when absent.
    ///
    /// The maximum is not enforced here.
    async fn increment(&self, owner: &UserId, seed: &LimitSeed) -> AppResult<LimitUsage>;

    /// Remove one from a counter, floored at zero.
    ///
    /// Returns `None` without creating anything when the owner has no pool
    /// or the pool has no such limit.
    async fn decrement(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Option<Decrement>>;

    /// Record `object` as owned by `owner` and increment its counter.
    ///
    /// Returns `None`, counting nothing, when the object is already recorded.
    async fn attach(
        &self,
        object: &OwnedObject,
        owner: &UserId,
        seed: &LimitSeed,
    ) -> AppResult<Option<LimitUsage>>;

    /// Forget `object` and decrement `kind` for the owner it was recorded
    /// against.
    ///
    /// Returns `None`, changing nothing, when the object is not recorded.
    async fn detach(&self, object: &OwnedObject, kind: &LimitKind) -> AppResult<Option<Detached>>;

    /// Atomically check the maximum and add one if it is not reached.
    async fn try_reserve(&self, owner: &UserId, seed: &LimitSeed) -> AppResult<Admission>;

    /// Create the owner's pool if needed and every missing limit in it.
    ///
    /// Returns the number of limits created.
    async fn ensure_pool(&self, owner: &UserId, seeds: &[LimitSeed]) -> AppResult<u64>;

    /// Add every missing limit to every existing pool. Existing limits are
    /// left untouched. Returns the number of limits created.
    async fn backfill(&self, seeds: &[LimitSeed]) -> AppResult<u64>;

    /// Change the maximum of an existing limit. Returns `false` if absent.
    async fn set_max(&self, owner: &UserId, kind: &LimitKind, max: LimitMax) -> AppResult<bool>;

    /// Delete an owner's pool and all its limits. Returns `true` if deleted.
    async fn delete_pool(&self, owner: &UserId) -> AppResult<bool>;

    /// Count persisted pools and limits.
    async fn counts(&self) -> AppResult<StoreCounts>;

    /// Check that the store backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
