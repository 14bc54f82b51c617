//! Limit accounting service.
//!
//! Translates domain lifecycle into counter updates on a [`LimitStore`].
//! Increments are bookkeeping only and never enforce the maximum; the
//! admission gate is [`LimitAccounting::check_admission`] (optimistic read)
//! or [`LimitAccounting::reserve_usage`] (atomic check-and-increment).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;
use mailhub_core::traits::limit_store::{Detached, LimitSeed, LimitStore, StoreCounts};
use mailhub_core::traits::owner::OwnedObject;
use mailhub_core::types::id::UserId;
use mailhub_core::types::limit::{Admission, LimitKind, LimitMax, LimitUsage};

use crate::parameters::ParameterStore;
use crate::registry::KindRegistry;

/// Per-owner usage accounting.
#[derive(Debug)]
pub struct LimitAccounting {
    kinds: Arc<KindRegistry>,
    parameters: Arc<ParameterStore>,
    store: Arc<dyn LimitStore>,
    /// Decrements that found the counter already at zero.
    clamps: AtomicU64,
}

impl LimitAccounting {
    /// Creates the service.
    pub fn new(
        kinds: Arc<KindRegistry>,
        parameters: Arc<ParameterStore>,
        store: Arc<dyn LimitStore>,
    ) -> Self {
        Self {
            kinds,
            parameters,
            store,
            clamps: AtomicU64::new(0),
        }
    }

    /// The kind registry.
    pub fn kinds(&self) -> &Arc<KindRegistry> {
        &self.kinds
    }

    /// The default-maximum parameters.
    pub fn parameters(&self) -> &Arc<ParameterStore> {
        &self.parameters
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn LimitStore> {
        &self.store
    }

    /// Records one more resource of `kind` for `owner`.
    ///
    /// Creates the owner's pool and the limit when needed. Fails with
    /// `UnknownKind` if no extension registered `kind`.
    pub async fn increment_usage(&self, owner: &UserId, kind: &LimitKind) -> AppResult<LimitUsage> {
        let seed = self.seed(kind).await?;
        let usage = self.store.increment(owner, &seed).await?;
        note_exceeded(owner, &usage);
        Ok(usage)
    }

    /// Records `object` as created by `owner` and counts it as one `kind`.
    ///
    /// The ownership record and the increment are applied together. An
    /// object already recorded is not counted again and yields `None`.
    pub async fn attach(
        &self,
        object: &OwnedObject,
        owner: &UserId,
        kind: &LimitKind,
    ) -> AppResult<Option<LimitUsage>> {
        let seed = self.seed(kind).await?;
        let Some(usage) = self.store.attach(object, owner, &seed).await? else {
            debug!(object = %object, owner = %owner, "Object already counted");
            return Ok(None);
        };
        note_exceeded(owner, &usage);
        Ok(Some(usage))
    }

    /// Records one resource of `kind` less for `owner`.
    ///
    /// Does nothing, and creates nothing, when the kind is unknown or the
    /// owner has no such limit. A counter already at zero stays at zero and
    /// the clamp is reported.
    pub async fn decrement_usage(
        &self,
        owner: &UserId,
        kind: &LimitKind,
    ) -> AppResult<Option<LimitUsage>> {
        self.kinds.ensure_sealed().await?;
        if !self.kinds.contains(kind.as_str()).await {
            debug!(owner = %owner, kind = %kind, "Decrement of unknown kind ignored");
            return Ok(None);
        }

        let Some(decrement) = self.store.decrement(owner, kind).await? else {
            debug!(owner = %owner, kind = %kind, "No limit to decrement");
            return Ok(None);
        };

        if decrement.clamped {
            self.note_clamp(owner, kind);
        }
        Ok(Some(decrement.usage))
    }

    /// Forgets `object` and releases one `kind` from the owner it was
    /// recorded against.
    ///
    /// Returns `None`, changing nothing, when the kind is unknown or the
    /// object has no recorded owner.
    pub async fn detach(
        &self,
        object: &OwnedObject,
        kind: &LimitKind,
    ) -> AppResult<Option<Detached>> {
        self.kinds.ensure_sealed().await?;
        if !self.kinds.contains(kind.as_str()).await {
            debug!(object = %object, kind = %kind, "Detach of unknown kind ignored");
            return Ok(None);
        }

        let Some(detached) = self.store.detach(object, kind).await? else {
            return Ok(None);
        };
        match &detached.decrement {
            Some(decrement) if decrement.clamped => self.note_clamp(&detached.owner, kind),
            Some(_) => {}
            None => debug!(object = %object, owner = %detached.owner, "No limit to decrement"),
        }
        Ok(Some(detached))
    }

    /// The administrator `object` is recorded against, if any.
    pub async fn owner_of(&self, object: &OwnedObject) -> AppResult<Option<UserId>> {
        self.store.owner_of(object).await
    }

    /// Reads the usage of `kind` for `owner` without creating any state.
    ///
    /// An untouched pair reports zero usage and the current default maximum.
    pub async fn get_usage(&self, owner: &UserId, kind: &LimitKind) -> AppResult<LimitUsage> {
        let seed = self.seed(kind).await?;
        Ok(self
            .store
            .usage(owner, kind)
            .await?
            .unwrap_or_else(|| LimitUsage::new(seed.kind, 0, seed.max)))
    }

    /// Optimistic admission check: may `owner` create one more `kind`?
    ///
    /// Reads only. Two concurrent checks may both be granted, in which case
    /// the following increments push usage above the maximum.
    pub async fn check_admission(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Admission> {
        let usage = self.get_usage(owner, kind).await?;
        if usage.admits_one_more() {
            Ok(Admission::Granted { usage })
        } else {
            debug!(owner = %owner, kind = %kind, current = usage.current, max = %usage.max, "Admission denied");
            Ok(Admission::Denied { usage })
        }
    }

    /// Atomic admission: checks the maximum and increments in one step.
    ///
    /// Used instead of a check followed by an increment; a granted
    /// reservation has already been counted.
    pub async fn reserve_usage(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Admission> {
        let seed = self.seed(kind).await?;
        let admission = self.store.try_reserve(owner, &seed).await?;
        if !admission.is_granted() {
            debug!(owner = %owner, kind = %kind, "Reservation denied");
        }
        Ok(admission)
    }

    /// Creates `owner`'s pool with a limit for every registered kind.
    pub async fn materialize_pool(&self, owner: &UserId) -> AppResult<u64> {
        let seeds = self.all_seeds().await?;
        let created = self.store.ensure_pool(owner, &seeds).await?;
        info!(owner = %owner, created = created, "Limit pool materialized");
        Ok(created)
    }

    /// Adds the limits of every registered kind missing from existing pools.
    pub async fn backfill(&self) -> AppResult<u64> {
        let seeds = self.all_seeds().await?;
        let created = self.store.backfill(&seeds).await?;
        info!(kinds = seeds.len(), created = created, "Limit pools backfilled");
        Ok(created)
    }

    /// Deletes `owner`'s pool and all its limits.
    pub async fn delete_pool(&self, owner: &UserId) -> AppResult<bool> {
        let deleted = self.store.delete_pool(owner).await?;
        if deleted {
            info!(owner = %owner, "Limit pool deleted");
        }
        Ok(deleted)
    }

    /// Changes the maximum of one of `owner`'s existing limits.
    ///
    /// The pool keeps every other limit untouched. Fails with `NotFound`
    /// when the owner has no such limit yet.
    pub async fn set_max(
        &self,
        owner: &UserId,
        kind: &LimitKind,
        max: LimitMax,
    ) -> AppResult<LimitUsage> {
        self.kinds.require(kind).await?;
        if !self.store.set_max(owner, kind, max).await? {
            return Err(AppError::not_found(format!(
                "No limit '{kind}' for owner {owner}"
            )));
        }
        info!(owner = %owner, kind = %kind, max = %max, "Limit maximum changed");
        self.get_usage(owner, kind).await
    }

    /// Every limit of `owner`, or `None` if the owner has no pool.
    pub async fn pool_usage(&self, owner: &UserId) -> AppResult<Option<Vec<LimitUsage>>> {
        self.store.pool_usage(owner).await
    }

    /// Number of persisted pools and limits.
    pub async fn counts(&self) -> AppResult<StoreCounts> {
        self.store.counts().await
    }

    /// Number of decrements clamped at zero since start.
    pub fn clamp_count(&self) -> u64 {
        self.clamps.load(Ordering::Relaxed)
    }

    fn note_clamp(&self, owner: &UserId, kind: &LimitKind) {
        let total = self.clamps.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            owner = %owner,
            kind = %kind,
            clamps = total,
            "Limit already at zero, decrement clamped"
        );
    }

    async fn seed(&self, kind: &LimitKind) -> AppResult<LimitSeed> {
        let info = self.kinds.require(kind).await?;
        let max = self.parameters.default_max(&info).await;
        Ok(LimitSeed::new(info.name, max))
    }

    async fn all_seeds(&self) -> AppResult<Vec<LimitSeed>> {
        self.kinds.ensure_sealed().await?;
        let mut seeds = Vec::new();
        for info in self.kinds.list_kinds().await {
            let max = self.parameters.default_max(&info).await;
            seeds.push(LimitSeed::new(info.name, max));
        }
        Ok(seeds)
    }
}

fn note_exceeded(owner: &UserId, usage: &LimitUsage) {
    if usage.is_exceeded() {
        info!(
            owner = %owner,
            kind = %usage.kind,
            current = usage.current,
            max = %usage.max,
            "Usage above maximum"
        );
    }
}
