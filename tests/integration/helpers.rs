//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use mailhub_core::config::LimitsConfig;
use mailhub_core::error::AppError;
use mailhub_core::events::{
    AccountEvent, DomainEvent, RelayDomainAliasRef, RelayDomainEvent, RelayDomainRef,
};
use mailhub_core::result::AppResult;
use mailhub_core::traits::limit_store::{Decrement, Detached, LimitSeed, LimitStore, StoreCounts};
use mailhub_core::traits::owner::{OwnedObject, OwnerResolver};
use mailhub_core::types::id::{RelayDomainAliasId, RelayDomainId, UserId};
use mailhub_core::types::limit::{Admission, LimitKind, LimitMax, LimitUsage};
use mailhub_entity::user::UserRole;
use mailhub_limits::{
    KindRegistry, LimitAccounting, LimitsExtension, MemoryLimitStore, ParameterStore,
};
use mailhub_plugin::ExtensionManager;
use plugin_relay_domains::{RELAY_DOMAIN_ALIASES_LIMIT, RELAY_DOMAINS_LIMIT, RelayDomainsExtension};

/// In-memory store whose ownership lookups can be made to fail per object
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryLimitStore,
    broken: RwLock<HashSet<OwnedObject>>,
}

impl FlakyStore {
    /// Wrap an existing store
    pub fn new(inner: MemoryLimitStore) -> Self {
        Self {
            inner,
            broken: RwLock::new(HashSet::new()),
        }
    }

    /// Make every lookup and detach of `object` fail
    pub async fn break_object(&self, object: OwnedObject) {
        self.broken.write().await.insert(object);
    }

    async fn check(&self, object: &OwnedObject) -> AppResult<()> {
        if self.broken.read().await.contains(object) {
            return Err(AppError::database(format!("owner lookup failed for {object}")));
        }
        Ok(())
    }
}

#[async_trait]
impl OwnerResolver for FlakyStore {
    async fn owner_of(&self, object: &OwnedObject) -> AppResult<Option<UserId>> {
        self.check(object).await?;
        self.inner.owner_of(object).await
    }
}

#[async_trait]
impl LimitStore for FlakyStore {
    async fn usage(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Option<LimitUsage>> {
        self.inner.usage(owner, kind).await
    }

    async fn pool_usage(&self, owner: &UserId) -> AppResult<Option<Vec<LimitUsage>>> {
        self.inner.pool_usage(owner).await
    }

    async fn increment(&self, owner: &UserId, seed: &LimitSeed) -> AppResult<LimitUsage> {
        self.inner.increment(owner, seed).await
    }

    async fn decrement(&self, owner: &UserId, kind: &LimitKind) -> AppResult<Option<Decrement>> {
        self.inner.decrement(owner, kind).await
    }

    async fn attach(
        &self,
        object: &OwnedObject,
        owner: &UserId,
        seed: &LimitSeed,
    ) -> AppResult<Option<LimitUsage>> {
        self.inner.attach(object, owner, seed).await
    }

    async fn detach(&self, object: &OwnedObject, kind: &LimitKind) -> AppResult<Option<Detached>> {
        self.check(object).await?;
        self.inner.detach(object, kind).await
    }

    async fn try_reserve(&self, owner: &UserId, seed: &LimitSeed) -> AppResult<Admission> {
        self.inner.try_reserve(owner, seed).await
    }

    async fn ensure_pool(&self, owner: &UserId, seeds: &[LimitSeed]) -> AppResult<u64> {
        self.inner.ensure_pool(owner, seeds).await
    }

    async fn backfill(&self, seeds: &[LimitSeed]) -> AppResult<u64> {
        self.inner.backfill(seeds).await
    }

    async fn set_max(&self, owner: &UserId, kind: &LimitKind, max: LimitMax) -> AppResult<bool> {
        self.inner.set_max(owner, kind, max).await
    }

    async fn delete_pool(&self, owner: &UserId) -> AppResult<bool> {
        self.inner.delete_pool(owner).await
    }

    async fn counts(&self) -> AppResult<StoreCounts> {
        self.inner.counts().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}

/// Wiring of the store, the accounting service, and both extensions
pub struct TestApp {
    /// Booted extension manager
    pub manager: ExtensionManager,
    /// Accounting service
    pub accounting: Arc<LimitAccounting>,
    /// Backing store and ownership ledger
    pub store: Arc<FlakyStore>,
}

impl TestApp {
    /// Boot with registered defaults (both relay kinds at 0)
    pub async fn new() -> Self {
        Self::with_defaults(&[]).await
    }

    /// Boot with admin-scope default overrides
    pub async fn with_defaults(defaults: &[(&str, i64)]) -> Self {
        Self::boot_on(MemoryLimitStore::new(), defaults).await
    }

    /// Boot on an existing store
    pub async fn boot_on(store: MemoryLimitStore, defaults: &[(&str, i64)]) -> Self {
        let config = LimitsConfig {
            defaults: defaults
                .iter()
                .map(|(name, max)| (name.to_string(), *max))
                .collect::<HashMap<_, _>>(),
            ..LimitsConfig::default()
        };

        let kinds = Arc::new(KindRegistry::new());
        let parameters = Arc::new(ParameterStore::from_config(kinds.clone(), &config));
        let store = Arc::new(FlakyStore::new(store));
        let accounting = Arc::new(LimitAccounting::new(kinds, parameters, store.clone()));

        let manager = ExtensionManager::new();
        manager
            .register(Arc::new(RelayDomainsExtension::new(accounting.clone())))
            .await
            .expect("register relay domains");
        manager
            .register(Arc::new(LimitsExtension::new(accounting.clone())))
            .await
            .expect("register limits");
        manager.boot().await.expect("boot extensions");

        Self {
            manager,
            accounting,
            store,
        }
    }

    /// Publish an event to every subscribed extension
    pub async fn publish(&self, event: DomainEvent) -> AppResult<()> {
        self.manager.dispatcher().publish(event).await.map(|_| ())
    }

    /// Create an account with the given role
    pub async fn create_account(&self, role: UserRole) -> UserId {
        let user_id = UserId::new();
        self.publish(DomainEvent::system(
            AccountEvent::Created {
                user_id,
                username: format!("{}@example.com", role.as_str()),
                role: role.as_str().to_string(),
            }
            .into(),
        ))
        .await
        .expect("account created");
        user_id
    }

    /// Create a relay domain owned by `owner`
    pub async fn create_domain(&self, owner: UserId, name: &str) -> AppResult<RelayDomainRef> {
        let domain = RelayDomainRef {
            id: RelayDomainId::new(),
            name: name.to_string(),
            aliases: Vec::new(),
        };
        self.publish(DomainEvent::new(
            Some(owner),
            RelayDomainEvent::Created {
                created_by: owner,
                domain: domain.clone(),
            }
            .into(),
        ))
        .await?;
        Ok(domain)
    }

    /// Create an alias of `domain` owned by `owner`
    pub async fn create_alias(
        &self,
        owner: UserId,
        domain: &mut RelayDomainRef,
        name: &str,
    ) -> AppResult<RelayDomainAliasRef> {
        let alias = RelayDomainAliasRef {
            id: RelayDomainAliasId::new(),
            name: name.to_string(),
            target: domain.id,
        };
        self.publish(DomainEvent::new(
            Some(owner),
            RelayDomainEvent::AliasCreated {
                created_by: owner,
                alias: alias.clone(),
            }
            .into(),
        ))
        .await?;
        domain.aliases.push(alias.clone());
        Ok(alias)
    }

    /// Publish the creation of `domain` again, as a redelivered event would
    pub async fn replay_domain_created(&self, owner: UserId, domain: &RelayDomainRef) -> AppResult<()> {
        self.publish(DomainEvent::new(
            Some(owner),
            RelayDomainEvent::Created {
                created_by: owner,
                domain: domain.clone(),
            }
            .into(),
        ))
        .await
    }

    /// Delete a relay domain together with its aliases
    pub async fn delete_domain(&self, domain: RelayDomainRef) -> AppResult<()> {
        self.publish(DomainEvent::system(RelayDomainEvent::Deleted { domain }.into()))
            .await
    }

    /// Delete aliases
    pub async fn delete_aliases(&self, aliases: Vec<RelayDomainAliasRef>) -> AppResult<()> {
        self.publish(DomainEvent::system(
            RelayDomainEvent::AliasDeleted { aliases }.into(),
        ))
        .await
    }

    /// Current relay domain count of `owner`
    pub async fn domains(&self, owner: &UserId) -> u32 {
        self.count(owner, RELAY_DOMAINS_LIMIT).await
    }

    /// Current relay domain alias count of `owner`
    pub async fn aliases(&self, owner: &UserId) -> u32 {
        self.count(owner, RELAY_DOMAIN_ALIASES_LIMIT).await
    }

    /// Current count of `kind` for `owner`
    pub async fn count(&self, owner: &UserId, kind: &str) -> u32 {
        self.accounting
            .get_usage(owner, &LimitKind::new(kind))
            .await
            .expect("usage")
            .current
    }
}
