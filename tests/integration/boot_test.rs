//! Integration tests for extension boot and the kind registry lifecycle.

mod helpers;

use std::sync::Arc;

use async_trait::async_trait;

use mailhub_core::error::{ErrorKind, LimitError};
use mailhub_core::result::AppResult;
use mailhub_core::traits::limit_store::{LimitSeed, LimitStore};
use mailhub_core::traits::parameters::ParameterRepository;
use mailhub_core::types::id::UserId;
use mailhub_core::types::limit::{LimitKind, LimitMax};
use mailhub_core::types::parameter::ParameterLevel;
use mailhub_limits::{
    KindRegistry, LimitAccounting, LimitKindInfo, LimitsExtension, MemoryLimitStore,
    MemoryParameterRepository, ParameterStore,
};
use mailhub_plugin::{Extension, ExtensionInfo, ExtensionManager, HookHandler, HookPoint};
use plugin_relay_domains::{
    RELAY_DOMAIN_ALIASES_LIMIT, RELAY_DOMAINS_EXTENSION_ID, RELAY_DOMAINS_LIMIT,
    RelayDomainsExtension,
};

fn accounting() -> Arc<LimitAccounting> {
    let kinds = Arc::new(KindRegistry::new());
    let parameters = Arc::new(ParameterStore::new(kinds.clone()));
    Arc::new(LimitAccounting::new(
        kinds,
        parameters,
        Arc::new(MemoryLimitStore::new()),
    ))
}

fn relay_domains(accounting: &Arc<LimitAccounting>) -> Arc<RelayDomainsExtension> {
    Arc::new(RelayDomainsExtension::new(accounting.clone()))
}

/// Extension registering one kind at load time.
#[derive(Debug)]
struct KindOwner {
    accounting: Arc<LimitAccounting>,
    kind: LimitKindInfo,
}

#[async_trait]
impl Extension for KindOwner {
    fn info(&self) -> ExtensionInfo {
        ExtensionInfo {
            id: "mailboxes".to_string(),
            name: "Mailboxes".to_string(),
            version: "0.1.0".to_string(),
            description: String::new(),
            depends_on: vec!["limits".to_string()],
        }
    }

    async fn on_load(&self) -> AppResult<()> {
        self.accounting.kinds().register(self.kind.clone()).await?;
        Ok(())
    }

    fn handlers(&self) -> Vec<(HookPoint, Arc<dyn HookHandler>)> {
        Vec::new()
    }
}

#[tokio::test]
async fn test_limits_load_before_relay_domains() {
    let accounting = accounting();
    let manager = ExtensionManager::new();
    manager.register(relay_domains(&accounting)).await.unwrap();
    manager
        .register(Arc::new(LimitsExtension::new(accounting.clone())))
        .await
        .unwrap();

    let order = manager.boot().await.unwrap();
    assert_eq!(order, vec!["limits", RELAY_DOMAINS_EXTENSION_ID]);
    assert!(manager.is_booted().await);

    let kinds: Vec<String> = accounting
        .kinds()
        .list_kinds()
        .await
        .into_iter()
        .map(|k| k.name.to_string())
        .collect();
    assert_eq!(kinds, vec![RELAY_DOMAINS_LIMIT, RELAY_DOMAIN_ALIASES_LIMIT]);
}

#[tokio::test]
async fn test_relay_domains_requires_limits() {
    let accounting = accounting();
    let manager = ExtensionManager::new();
    manager.register(relay_domains(&accounting)).await.unwrap();

    let err = manager.boot().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Plugin);
    assert!(err.message.contains("not registered"));
    assert!(!manager.is_booted().await);
}

#[tokio::test]
async fn test_registry_sealed_after_boot() {
    let app = helpers::TestApp::new().await;

    let err = app
        .accounting
        .kinds()
        .register(LimitKindInfo::new(
            "mailboxes_limit",
            LimitMax::Fixed(0),
            "Mailboxes",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LimitError::RegistrySealed { .. }));
    assert!(!app.accounting.kinds().contains("mailboxes_limit").await);
}

#[tokio::test]
async fn test_accounting_before_boot_is_rejected() {
    let accounting = accounting();
    for kind in RelayDomainsExtension::limit_kinds() {
        accounting.kinds().register(kind).await.unwrap();
    }
    let owner = UserId::new();
    let kind = LimitKind::new(RELAY_DOMAINS_LIMIT);

    let err = accounting.increment_usage(&owner, &kind).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Registry);
    assert_eq!(err.as_limit_error(), Some(&LimitError::RegistryNotSealed));

    let err = accounting.decrement_usage(&owner, &kind).await.unwrap_err();
    assert_eq!(err.as_limit_error(), Some(&LimitError::RegistryNotSealed));

    assert!(accounting.backfill().await.is_err());
    assert_eq!(accounting.counts().await.unwrap().pools, 0);
}

#[tokio::test]
async fn test_boot_backfills_existing_pools() {
    let store = MemoryLimitStore::new();
    let owner = UserId::new();
    let seed = LimitSeed::new(LimitKind::new(RELAY_DOMAINS_LIMIT), LimitMax::Fixed(7));
    store.increment(&owner, &seed).await.unwrap();
    store.increment(&owner, &seed).await.unwrap();

    let app = helpers::TestApp::boot_on(store.clone(), &[(RELAY_DOMAIN_ALIASES_LIMIT, 3)]).await;

    let pool = app.store.pool_usage(&owner).await.unwrap().unwrap();
    assert_eq!(pool.len(), 2);
    let domains = app
        .accounting
        .get_usage(&owner, &LimitKind::new(RELAY_DOMAINS_LIMIT))
        .await
        .unwrap();
    assert_eq!(domains.current, 2);
    assert_eq!(domains.max, LimitMax::Fixed(7));
    let aliases = app
        .accounting
        .get_usage(&owner, &LimitKind::new(RELAY_DOMAIN_ALIASES_LIMIT))
        .await
        .unwrap();
    assert_eq!(aliases.current, 0);
    assert_eq!(aliases.max, LimitMax::Fixed(3));

    // Idempotent
    assert_eq!(app.accounting.backfill().await.unwrap(), 0);
    assert_eq!(app.domains(&owner).await, 2);
    assert_eq!(app.store.counts().await.unwrap().limits, 2);
}

#[tokio::test]
async fn test_conflicting_default_fails_boot() {
    let accounting = accounting();
    let manager = ExtensionManager::new();
    manager
        .register(Arc::new(LimitsExtension::new(accounting.clone())))
        .await
        .unwrap();
    manager.register(relay_domains(&accounting)).await.unwrap();
    manager
        .register(Arc::new(KindOwner {
            accounting: accounting.clone(),
            kind: LimitKindInfo::new(RELAY_DOMAINS_LIMIT, LimitMax::Fixed(5), "Relay domains"),
        }))
        .await
        .unwrap();

    let err = manager.boot().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateKind);
    assert_eq!(
        err.as_limit_error(),
        Some(&LimitError::DuplicateKind {
            name: RELAY_DOMAINS_LIMIT.to_string(),
            existing: 0,
            requested: 5,
        })
    );
    assert!(!accounting.kinds().is_sealed().await);
}

#[tokio::test]
async fn test_identical_registration_is_accepted() {
    let accounting = accounting();
    let manager = ExtensionManager::new();
    manager
        .register(Arc::new(LimitsExtension::new(accounting.clone())))
        .await
        .unwrap();
    manager.register(relay_domains(&accounting)).await.unwrap();
    manager
        .register(Arc::new(KindOwner {
            accounting: accounting.clone(),
            kind: LimitKindInfo::new(RELAY_DOMAINS_LIMIT, LimitMax::Fixed(0), "Relay domains"),
        }))
        .await
        .unwrap();

    manager.boot().await.unwrap();
    assert_eq!(accounting.kinds().list_kinds().await.len(), 2);
    assert!(accounting.kinds().is_sealed().await);
}

#[tokio::test]
async fn test_register_after_boot_is_rejected() {
    let app = helpers::TestApp::new().await;
    let accounting = accounting();

    let err = app
        .manager
        .register(relay_domains(&accounting))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Plugin);
}

#[tokio::test]
async fn test_boot_loads_stored_defaults() {
    let repository = Arc::new(MemoryParameterRepository::new());
    let kinds = Arc::new(KindRegistry::new());
    let parameters =
        Arc::new(ParameterStore::new(kinds.clone()).with_repository(repository.clone()));
    let accounting = Arc::new(LimitAccounting::new(
        kinds,
        parameters,
        Arc::new(MemoryLimitStore::new()),
    ));
    repository
        .save(
            "limits",
            ParameterLevel::Admin,
            "deflt_relay_domain_aliases_limit",
            6,
        )
        .await
        .unwrap();

    let manager = ExtensionManager::new();
    manager
        .register(Arc::new(LimitsExtension::new(accounting.clone())))
        .await
        .unwrap();
    manager.register(relay_domains(&accounting)).await.unwrap();
    manager.boot().await.unwrap();

    let usage = accounting
        .get_usage(&UserId::new(), &LimitKind::new(RELAY_DOMAIN_ALIASES_LIMIT))
        .await
        .unwrap();
    assert_eq!(usage.max, LimitMax::Fixed(6));
}
