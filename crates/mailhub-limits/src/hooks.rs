//! Hook handlers of the limits extension.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use mailhub_core::error::AppError;
use mailhub_core::events::{AccountEvent, EventPayload, LimitsEvent};
use mailhub_core::result::AppResult;
use mailhub_entity::user::UserRole;
use mailhub_plugin::hooks::definitions::{HookPayload, HookResult};
use mailhub_plugin::hooks::registry::HookHandler;

use crate::accounting::LimitAccounting;
use crate::extension::LIMITS_EXTENSION_ID;

fn unexpected(payload: &HookPayload) -> AppError {
    AppError::plugin(format!(
        "limits: unexpected payload on hook {}",
        payload.hook
    ))
}

/// Hook handler for `account_created`: materialize the pool of limited roles.
#[derive(Debug)]
pub struct AccountCreatedHook {
    accounting: Arc<LimitAccounting>,
}

impl AccountCreatedHook {
    /// Create a new `account_created` hook handler.
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }
}

#[async_trait]
impl HookHandler for AccountCreatedHook {
    async fn handle(&self, payload: &HookPayload) -> AppResult<HookResult> {
        let EventPayload::Account(AccountEvent::Created {
            user_id,
            username,
            role,
        }) = payload.payload()
        else {
            return Err(unexpected(payload));
        };

        let role: UserRole = match role.parse() {
            Ok(role) => role,
            Err(e) => {
                warn!(user = %username, role = %role, error = %e, "Unknown role, no pool");
                return Ok(HookResult::none(LIMITS_EXTENSION_ID));
            }
        };
        if !role.has_limits() {
            debug!(user = %username, role = %role, "Role is not limited, no pool");
            return Ok(HookResult::none(LIMITS_EXTENSION_ID));
        }

        self.accounting.materialize_pool(user_id).await?;
        Ok(HookResult::none(LIMITS_EXTENSION_ID))
    }

    fn plugin_id(&self) -> &str {
        LIMITS_EXTENSION_ID
    }
}

/// Hook handler for `account_deleted`: drop the pool and all its limits.
#[derive(Debug)]
pub struct AccountDeletedHook {
    accounting: Arc<LimitAccounting>,
}

impl AccountDeletedHook {
    /// Create a new `account_deleted` hook handler.
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }
}

#[async_trait]
impl HookHandler for AccountDeletedHook {
    async fn handle(&self, payload: &HookPayload) -> AppResult<HookResult> {
        let EventPayload::Account(AccountEvent::Deleted { user_id, username }) = payload.payload()
        else {
            return Err(unexpected(payload));
        };

        if !self.accounting.delete_pool(user_id).await? {
            debug!(user = %username, "Account had no limit pool");
        }
        Ok(HookResult::none(LIMITS_EXTENSION_ID))
    }

    fn plugin_id(&self) -> &str {
        LIMITS_EXTENSION_ID
    }

    // Runs after the extensions still decrementing into the pool.
    fn priority(&self) -> i32 {
        1000
    }
}

/// Hook handler for `can_create`: answer the admission check.
#[derive(Debug)]
pub struct CanCreateHook {
    accounting: Arc<LimitAccounting>,
}

impl CanCreateHook {
    /// Create a new `can_create` hook handler.
    pub fn new(accounting: Arc<LimitAccounting>) -> Self {
        Self { accounting }
    }
}

#[async_trait]
impl HookHandler for CanCreateHook {
    async fn handle(&self, payload: &HookPayload) -> AppResult<HookResult> {
        let EventPayload::Limits(LimitsEvent::CanCreate { user_id, kind }) = payload.payload()
        else {
            return Err(unexpected(payload));
        };

        let admission = self.accounting.check_admission(user_id, kind).await?;
        if !admission.is_granted() {
            let usage = admission.usage();
            info!(
                owner = %user_id,
                kind = %kind,
                current = usage.current,
                max = %usage.max,
                "Creation refused, limit reached"
            );
        }
        Ok(HookResult::admission(LIMITS_EXTENSION_ID, admission))
    }

    fn plugin_id(&self) -> &str {
        LIMITS_EXTENSION_ID
    }
}
