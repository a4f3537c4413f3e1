//! Operation token - identity of one in-flight tool call.

use std::sync::Arc;
use std::time::Instant;

pub use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Handle for a single in-flight operation.
///
/// Tokens are compared by identity (`Arc::ptr_eq`), never by value: two calls
/// with the same tool name and params are still different operations. Not
/// `Clone`; share it through `Arc`.
#[derive(Debug)]
pub struct OperationToken {
    id: Uuid,
    tool: String,
    cancel_token: CancellationToken,
    started_at: Instant,
}

impl OperationToken {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool: tool.into(),
            cancel_token: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }

    /// Diagnostic id for log fields. Not used for staleness checks.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Signal handed to the transport.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Whether `a` and `b` are the same operation.
    pub fn same(a: &Arc<Self>, b: &Arc<Self>) -> bool {
        Arc::ptr_eq(a, b)
    }
}
