//! Wires the stores, the accounting service, and the extensions together.

use std::sync::Arc;

use tracing::info;

use mailhub_core::config::{AppConfig, StoreBackend};
use mailhub_core::error::AppError;
use mailhub_core::result::AppResult;
use mailhub_core::traits::limit_store::LimitStore;
use mailhub_core::traits::parameters::ParameterRepository;
use mailhub_database::{DatabasePool, PgLimitStore, PgParameterRepository};
use mailhub_limits::{
    KindRegistry, LimitAccounting, LimitsExtension, MemoryLimitStore, MemoryParameterRepository,
    ParameterStore,
};
use mailhub_plugin::ExtensionManager;
use plugin_relay_domains::{RELAY_DOMAINS_EXTENSION_ID, RelayDomainsExtension};

/// Booted services.
#[derive(Debug)]
pub struct Runtime {
    /// Extension manager with every enabled extension booted.
    pub manager: ExtensionManager,
    /// Limit accounting service.
    pub accounting: Arc<LimitAccounting>,
    /// Database pool, when the PostgreSQL store is selected.
    pub database: Option<DatabasePool>,
}

impl Runtime {
    /// Release the database pool.
    pub async fn close(self) {
        self.manager.shutdown().await;
        if let Some(database) = self.database {
            database.close().await;
        }
    }
}

/// Storage selected by `limits.store`.
#[derive(Debug)]
pub struct Stores {
    /// Counters and ownership ledger.
    pub limits: Arc<dyn LimitStore>,
    /// Edited parameter values.
    pub parameters: Arc<dyn ParameterRepository>,
    /// Database pool, when the PostgreSQL store is selected.
    pub database: Option<DatabasePool>,
}

/// Open the configured stores and check that they answer.
pub async fn open_stores(config: &AppConfig) -> AppResult<Stores> {
    info!(store = %config.limits.store, "Opening limit store");
    let stores = match config.limits.store {
        StoreBackend::Memory => Stores {
            limits: Arc::new(MemoryLimitStore::new()),
            parameters: Arc::new(MemoryParameterRepository::new()),
            database: None,
        },
        StoreBackend::Postgres => {
            let database = DatabasePool::connect(&config.database).await?;
            Stores {
                limits: Arc::new(PgLimitStore::new(database.pool().clone())),
                parameters: Arc::new(PgParameterRepository::new(database.pool().clone())),
                database: Some(database),
            }
        }
    };

    if !stores.limits.health_check().await? {
        return Err(AppError::database("Limit store is not healthy"));
    }
    Ok(stores)
}

/// Build the services and boot the enabled extensions.
pub async fn boot(config: &AppConfig) -> AppResult<Runtime> {
    let stores = open_stores(config).await?;

    let kinds = Arc::new(KindRegistry::new());
    let parameters = Arc::new(
        ParameterStore::from_config(kinds.clone(), &config.limits)
            .with_repository(stores.parameters),
    );
    let accounting = Arc::new(LimitAccounting::new(kinds, parameters, stores.limits));

    let manager = ExtensionManager::new();
    manager
        .register(Arc::new(LimitsExtension::new(accounting.clone())))
        .await?;

    if config.plugins.is_enabled(RELAY_DOMAINS_EXTENSION_ID) {
        manager
            .register(Arc::new(RelayDomainsExtension::new(accounting.clone())))
            .await?;
    }

    manager.boot().await?;

    Ok(Runtime {
        manager,
        accounting,
        database: stores.database,
    })
}
