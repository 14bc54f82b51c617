//! In-memory stores using Tokio locks, for tests and single-process runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use mailhub_core::result::AppResult;
use mailhub_core::traits::limit_store::{
    Decrement, Detached, LimitSeed, LimitStore, StoreCounts,
};
use mailhub_core::traits::owner::{OwnedObject, OwnerResolver};
use mailhub_core::traits::parameters::ParameterRepository;
use mailhub_core::types::id::UserId;
use mailhub_core::types::limit::{Admission, LimitKind, LimitMax, LimitUsage};
use mailhub_core::types::parameter::ParameterLevel;

/// Limits of one owner, in creation order.
type Pool = Vec<LimitUsage>;

#[derive(Debug, Default)]
struct InnerState {
    pools: HashMap<UserId, Pool>,
    owners: HashMap<OwnedObject, UserId>,
}

impl InnerState {
    fn increment(&mut self, owner: &UserId, seed: &LimitSeed) -> LimitUsage {
        let limit = limit_mut(self.pools.entry(*owner).or_default(), seed);
        limit.current = limit.current.saturating_add(1);

        debug!(owner = %owner, kind = %seed.kind, current = limit.current, "Limit incremented");
        limit.clone()
    }

    fn decrement(&mut self, owner: &UserId, kind: &LimitKind) -> Option<Decrement> {
        let limit = self
            .pools
            .get_mut(owner)
            .and_then(|pool| pool.iter_mut().find(|l| &l.kind == kind))?;

        let clamped = limit.current == 0;
        if !clamped {
            limit.current -= 1;
            debug!(owner = %owner, kind = %kind, current = limit.current, "Limit decremented");
        }

        Some(Decrement {
            usage: limit.clone(),
            clamped,
        })
    }
}

/// In-memory limit store.
///
/// Every operation runs under a single mutex, which serializes mutations
/// of the same pool like the row lock of the PostgreSQL store does, and
/// keeps the ownership ledger consistent with the counters.
#[derive(Debug, Clone, Default)]
pub struct MemoryLimitStore {
    state: Arc<Mutex<InnerState>>,
}

impl MemoryLimitStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Returns the limit for `seed`, creating it with a zero counter if absent.
fn limit_mut<'a>(pool: &'a mut Pool, seed: &LimitSeed) -> &'a mut LimitUsage {
    let index = match pool.iter().position(|l| l.kind == seed.kind) {
        Some(index) => index,
        None => {
            pool.push(LimitUsage::new(seed.kind.clone(), 0, seed.max));
            pool.len() - 1
        }
    };
    &mut pool[index]
}

/// Adds the limits of `seeds` missing from `pool`. Returns how many were added.
fn seed_pool(pool: &mut Pool, seeds: &[LimitSeed]) -> u64 {
    let mut created = 0;
    for seed in seeds {
        if !pool.iter().any(|l| l.kind == seed.kind) {
            pool.push(LimitUsage::new(seed.kind.clone(), 0, seed.max));
            created += 1;
        }
    }
    created
}

#[async_trait]
impl OwnerResolver for MemoryLimitStore {
    async fn owner_of(&self, object: &OwnedObject) -> AppResult<Option<UserId>> {
        Ok(self.state.lock().await.owners.get(object).copied())
    }
}

#[async_trait]
impl LimitStore for MemoryLimitStore {
    async fn usage(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Option<LimitUsage>> {
        let state = self.state.lock().await;
        Ok(state
            .pools
            .get(owner)
            .and_then(|pool| pool.iter().find(|l| &l.kind == kind))
            .cloned())
    }

    async fn pool_usage(&self, owner: &UserId) -> AppResult<Option<Vec<LimitUsage>>> {
        let state = self.state.lock().await;
        Ok(state.pools.get(owner).cloned())
    }

    async fn increment(&self, owner: &UserId, seed: &LimitSeed) -> AppResult<LimitUsage> {
        Ok(self.state.lock().await.increment(owner, seed))
    }

    async fn decrement(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Option<Decrement>> {
        Ok(self.state.lock().await.decrement(owner, kind))
    }

    async fn attach(
        &self,
        object: &OwnedObject,
        owner: &UserId,
        seed: &LimitSeed,
    ) -> AppResult<Option<LimitUsage>> {
        let mut state = self.state.lock().await;
        if state.owners.contains_key(object) {
            return Ok(None);
        }
        state.owners.insert(*object, *owner);
        Ok(Some(state.increment(owner, seed)))
    }

    async fn detach(&self, object: &OwnedObject, kind: &LimitKind) -> AppResult<Option<Detached>> {
        let mut state = self.state.lock().await;
        let Some(owner) = state.owners.remove(object) else {
            return Ok(None);
        };
        let decrement = state.decrement(&owner, kind);
        Ok(Some(Detached { owner, decrement }))
    }

    async fn try_reserve(&self, owner: &UserId, seed: &LimitSeed) -> AppResult<Admission> {
        let mut state = self.state.lock().await;
        let limit = limit_mut(state.pools.entry(*owner).or_default(), seed);

        if !limit.admits_one_more() {
            return Ok(Admission::Denied {
                usage: limit.clone(),
            });
        }

        limit.current = limit.current.saturating_add(1);
        Ok(Admission::Granted {
            usage: limit.clone(),
        })
    }

    async fn ensure_pool(&self, owner: &UserId, seeds: &[LimitSeed]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        Ok(seed_pool(state.pools.entry(*owner).or_default(), seeds))
    }

    async fn backfill(&self, seeds: &[LimitSeed]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        Ok(state
            .pools
            .values_mut()
            .map(|pool| seed_pool(pool, seeds))
            .sum())
    }

    async fn set_max(&self, owner: &UserId, kind: &LimitKind, max: LimitMax) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .pools
            .get_mut(owner)
            .and_then(|pool| pool.iter_mut().find(|l| &l.kind == kind))
        {
            Some(limit) => {
                limit.max = max;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_pool(&self, owner: &UserId) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.pools.remove(owner).is_some())
    }

    async fn counts(&self) -> AppResult<StoreCounts> {
        let state = self.state.lock().await;
        Ok(StoreCounts {
            pools: state.pools.len() as u64,
            limits: state.pools.values().map(|pool| pool.len() as u64).sum(),
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

/// Parameter values kept in memory, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryParameterRepository {
    values: RwLock<HashMap<(String, ParameterLevel), HashMap<String, i64>>>,
}

impl MemoryParameterRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParameterRepository for MemoryParameterRepository {
    async fn load(&self, app: &str, level: ParameterLevel) -> AppResult<HashMap<String, i64>> {
        let values = self.values.read().await;
        Ok(values
            .get(&(app.to_string(), level))
            .cloned()
            .unwrap_or_default())
    }

    async fn save(
        &self,
        app: &str,
        level: ParameterLevel,
        name: &str,
        value: i64,
    ) -> AppResult<()> {
        self.values
            .write()
            .await
            .entry((app.to_string(), level))
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }
}
