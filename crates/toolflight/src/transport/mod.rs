//! Transport layer for toolflight.
//!
//! The invoker only sees the [`Transport`] trait. An HTTP JSON-RPC transport
//! is provided; other transports (stdio, in-process) implement the same trait.

use async_trait::async_trait;

use crate::operation::CancellationToken;
use crate::outcome::{OperationError, ToolCallRequest, ToolCallResult};

pub mod http;

pub use http::{HttpTransport, HttpTransportConfig};

/// Performs one tool call.
///
/// Implementations must watch `cancel` and fail with
/// [`OperationError::Cancelled`] once it fires. Ignoring it is allowed; the
/// call then settles normally.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(
        &self,
        request: &ToolCallRequest,
        cancel: CancellationToken,
    ) -> Result<ToolCallResult, OperationError>;
}
