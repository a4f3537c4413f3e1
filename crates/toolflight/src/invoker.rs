//! Invoker - runs one tool call at a time and reports how it settled.
//!
//! The invoker owns a single slot holding the active operation token:
//! - `invoke()` installs a fresh token only when the slot is empty; busy calls are no-ops
//! - `cancel_active()` fires the active token's signal and never touches the slot
//! - On settlement the outcome is dispatched only if the token still owns the slot,
//!   and only the owning call clears it
//!
//! Each slot checkpoint is a single `send_if_modified` closure, so the read and
//! the conditional write cannot interleave with another checkpoint.

use std::sync::Arc;

use tokio::sync::watch;

use crate::operation::OperationToken;
use crate::outcome::{Outcome, Params, ToolCallRequest, ToolCallResult};
use crate::sink::{ErrorSink, ResultSink};
use crate::transport::Transport;

pub const DEFAULT_ERROR_CATEGORY: &str = "tools";

type ActiveSlot = watch::Sender<Option<Arc<OperationToken>>>;

#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Label passed to the error sink.
    pub error_category: String,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            error_category: std::env::var("TOOLFLIGHT_ERROR_CATEGORY")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_ERROR_CATEGORY.to_string()),
        }
    }
}

/// Single-flight, cancellable tool call invoker.
pub struct Invoker {
    slot: ActiveSlot,
    transport: Arc<dyn Transport>,
    results: Arc<dyn ResultSink>,
    errors: Arc<dyn ErrorSink>,
    config: InvokerConfig,
}

impl Invoker {
    pub fn new(
        transport: Arc<dyn Transport>,
        results: Arc<dyn ResultSink>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot,
            transport,
            results,
            errors,
            config: InvokerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InvokerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// True while an operation holds the slot.
    pub fn is_busy(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Observe busy/idle transitions.
    pub fn subscribe(&self) -> ActiveWatch {
        ActiveWatch {
            rx: self.slot.subscribe(),
        }
    }

    /// Run `name` with `params` unless another call is already running.
    ///
    /// Resolves once the outcome has been dispatched to the sinks, or dropped
    /// because a newer operation owns the slot. Never fails: errors are
    /// reported through the sinks.
    pub async fn invoke(&self, name: &str, params: Params) {
        let Some(token) = self.try_start(name) else {
            tracing::debug!(tool = %name, "Tool call already running, ignoring invoke");
            return;
        };

        let mut guard = ActiveGuard {
            slot: &self.slot,
            token: Arc::clone(&token),
            settled: false,
        };

        tracing::info!(operation_id = %token.id(), tool = %name, "Starting tool call");

        let request = ToolCallRequest::new(name, params);
        let settlement = self
            .transport
            .perform(&request, token.cancel_token())
            .await;
        guard.settled = true;

        if !guard.owns_slot() {
            tracing::debug!(
                operation_id = %token.id(),
                tool = %name,
                "Dropping stale settlement"
            );
            return;
        }

        self.dispatch(&token, Outcome::from_settlement(settlement));
        drop(guard);
    }

    /// Request cancellation of the running call, if any.
    ///
    /// Does not clear the slot; the running `invoke` does that when the
    /// transport settles.
    pub fn cancel_active(&self) {
        let active = self.slot.borrow().clone();
        let Some(token) = active else {
            return;
        };

        if !token.is_cancelled() {
            tracing::info!(
                operation_id = %token.id(),
                tool = %token.tool(),
                "Cancelling tool call"
            );
        }
        token.cancel();
    }

    /// Guard check and install as one step.
    fn try_start(&self, name: &str) -> Option<Arc<OperationToken>> {
        let mut started = None;
        self.slot.send_if_modified(|active| {
            if active.is_some() {
                return false;
            }
            let token = Arc::new(OperationToken::new(name));
            *active = Some(Arc::clone(&token));
            started = Some(token);
            true
        });
        started
    }

    fn dispatch(&self, token: &OperationToken, outcome: Outcome) {
        let category = self.config.error_category.as_str();

        tracing::debug!(
            operation_id = %token.id(),
            tool = %token.tool(),
            status = outcome.as_str(),
            elapsed_ms = token.elapsed().as_millis() as u64,
            "Tool call settled"
        );

        match outcome {
            Outcome::Success(result) => {
                self.results.receive_result(result);
                self.errors.clear_error(category);
            }
            Outcome::Cancelled => {
                self.results.receive_result(ToolCallResult::cancelled());
                self.errors.clear_error(category);
            }
            Outcome::Failed(error) => {
                tracing::warn!(
                    operation_id = %token.id(),
                    tool = %token.tool(),
                    error = %error,
                    "Tool call failed"
                );
                self.results
                    .receive_result(ToolCallResult::error(error.to_string()));
                self.errors.record_error(category, &error);
            }
        }
    }
}

/// Clears the slot when the owning `invoke` finishes, however it finishes.
///
/// If `invoke` is dropped before the transport settles, the operation is
/// cancelled as well.
struct ActiveGuard<'a> {
    slot: &'a ActiveSlot,
    token: Arc<OperationToken>,
    settled: bool,
}

impl ActiveGuard<'_> {
    fn owns_slot(&self) -> bool {
        self.slot
            .borrow()
            .as_ref()
            .is_some_and(|active| OperationToken::same(active, &self.token))
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(
                operation_id = %self.token.id(),
                tool = %self.token.tool(),
                "Invoke dropped before settlement, cancelling"
            );
            self.token.cancel();
        }

        let token = &self.token;
        self.slot.send_if_modified(|active| {
            let owned = active
                .as_ref()
                .is_some_and(|current| OperationToken::same(current, token));
            if owned {
                *active = None;
            }
            owned
        });
    }
}

/// Read-only view of the invoker's slot, for UI state (disable start, show cancel).
#[derive(Clone)]
pub struct ActiveWatch {
    rx: watch::Receiver<Option<Arc<OperationToken>>>,
}

impl ActiveWatch {
    pub fn is_busy(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Name of the running tool, if any.
    pub fn active_tool(&self) -> Option<String> {
        self.rx.borrow().as_ref().map(|t| t.tool().to_string())
    }

    /// Wait for the slot to change. Returns `false` once the invoker is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
