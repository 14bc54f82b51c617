//! Hook dispatcher: delivers events to registered handlers and aggregates results.
//!
//! Handlers are called sequentially in priority order.
//!
//! For creation and query hooks:
//! - The first handler error stops dispatching and is returned, so the
//!   triggering operation can roll back.
//!
//! For teardown hooks (`*_deleted`):
//! - A failing handler is logged and skipped; the remaining handlers run.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use mailhub_core::error::AppError;
use mailhub_core::events::{DomainEvent, LimitsEvent, SystemEvent};
use mailhub_core::result::AppResult;
use mailhub_core::types::id::UserId;
use mailhub_core::types::limit::{Admission, LimitKind};
use mailhub_core::types::parameter::{ParameterField, ParameterLevel};

use super::definitions::{HookOutput, HookPayload, HookResult};
use super::registry::{HookHandler, HookRegistry};

/// Dispatches hooks to all registered handlers.
#[derive(Debug)]
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
    /// Upper bound on a single handler invocation.
    timeout: Duration,
}

impl HookDispatcher {
    /// Creates a new hook dispatcher with a 30 second handler timeout.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the handler timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Dispatches a payload to every handler of its hook point.
    pub async fn dispatch(&self, payload: &HookPayload) -> AppResult<Vec<HookResult>> {
        let handlers = self.registry.get_handlers(&payload.hook).await;
        self.run(&handlers, payload).await
    }

    /// Publishes an event to every subscribed extension.
    pub async fn publish(&self, event: DomainEvent) -> AppResult<Vec<HookResult>> {
        self.dispatch(&HookPayload::new(event)).await
    }

    /// Publishes an event only to the handlers of the given extensions.
    pub async fn publish_to(
        &self,
        event: DomainEvent,
        plugin_ids: &[String],
    ) -> AppResult<Vec<HookResult>> {
        let payload = HookPayload::new(event);
        let handlers = self
            .registry
            .get_handlers_for_plugins(&payload.hook, plugin_ids)
            .await;
        self.run(&handlers, &payload).await
    }

    /// Collects the extra parameter fields every extension contributes to
    /// the settings form of `app` at `level`.
    pub async fn collect_parameters(
        &self,
        app: &str,
        level: ParameterLevel,
    ) -> AppResult<Vec<ParameterField>> {
        let event = DomainEvent::system(
            SystemEvent::GetExtraParameters {
                app: app.to_string(),
                level,
            }
            .into(),
        );

        let fields = self
            .publish(event)
            .await?
            .into_iter()
            .flat_map(|result| match result.output {
                HookOutput::Parameters(fields) => fields,
                _ => Vec::new(),
            })
            .collect();
        Ok(fields)
    }

    /// Asks whether `user_id` may create one more resource of `kind`.
    ///
    /// Any denial wins. Returns `None` when no extension answered.
    pub async fn can_create(
        &self,
        user_id: UserId,
        kind: LimitKind,
    ) -> AppResult<Option<Admission>> {
        let event = DomainEvent::new(
            Some(user_id),
            LimitsEvent::CanCreate { user_id, kind }.into(),
        );

        let mut decision = None;
        for result in self.publish(event).await? {
            if let HookOutput::Admission(admission) = result.output {
                if !admission.is_granted() {
                    return Ok(Some(admission));
                }
                decision = Some(admission);
            }
        }
        Ok(decision)
    }

    /// Returns a reference to the hook registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    async fn run(
        &self,
        handlers: &[Arc<dyn HookHandler>],
        payload: &HookPayload,
    ) -> AppResult<Vec<HookResult>> {
        if handlers.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            hook = %payload.hook,
            event_id = %payload.event.id,
            handler_count = handlers.len(),
            "Dispatching hook"
        );

        let teardown = payload.hook.is_teardown();
        let mut results = Vec::with_capacity(handlers.len());

        for handler in handlers {
            let outcome = match tokio::time::timeout(self.timeout, handler.handle(payload)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AppError::plugin(format!(
                    "Handler of '{}' timed out on {}",
                    handler.plugin_id(),
                    payload.hook
                ))),
            };

            match outcome {
                Ok(result) => results.push(result),
                Err(e) if teardown => {
                    warn!(
                        hook = %payload.hook,
                        plugin_id = %handler.plugin_id(),
                        error = %e,
                        "Teardown handler failed, skipping"
                    );
                }
                Err(e) => {
                    error!(
                        hook = %payload.hook,
                        plugin_id = %handler.plugin_id(),
                        error = %e,
                        "Handler failed, aborting dispatch"
                    );
                    return Err(e);
                }
            }
        }

        Ok(results)
    }
}
