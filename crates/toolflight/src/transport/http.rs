//! HTTP JSON-RPC transport.
//!
//! Sends `tools/call` requests to a single endpoint:
//! - Monotonic request ids per transport
//! - Optional bearer authentication (TOOLFLIGHT_AUTH_TOKEN)
//! - Cancellation drops the in-flight request and posts `notifications/cancelled`
//! - `shutdown()` waits for pending cancel notifications before the process exits

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio_util::task::TaskTracker;

use super::Transport;
use crate::VERSION;
use crate::operation::CancellationToken;
use crate::outcome::{OperationError, ToolCallRequest, ToolCallResult};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/mcp";

const JSONRPC_VERSION: &str = "2.0";

/// Upper bound on how long `shutdown()` waits for pending notifications.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub endpoint: String,
    pub auth_token: Option<String>,
    pub connect_timeout: Duration,
    /// Post `notifications/cancelled` when a call is cancelled mid-flight.
    pub notify_on_cancel: bool,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: std::env::var("TOOLFLIGHT_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            auth_token: std::env::var("TOOLFLIGHT_AUTH_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            connect_timeout: Duration::from_secs(10),
            notify_on_cancel: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<ToolCallResult>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

pub struct HttpTransport {
    config: HttpTransportConfig,
    client: reqwest::Client,
    next_id: AtomicU64,
    notifications: TaskTracker,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, reqwest::Error> {
        let mut headers = reqwest::header::HeaderMap::new();

        if let Some(ref token) = config.auth_token {
            match reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(reqwest::header::AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!(
                    "TOOLFLIGHT_AUTH_TOKEN is not a valid header value, sending requests without authorization"
                ),
            }
        }

        let user_agent = format!("toolflight/{}", VERSION);
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&user_agent) {
            headers.insert(reqwest::header::USER_AGENT, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            config,
            client,
            next_id: AtomicU64::new(1),
            notifications: TaskTracker::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Wait for pending cancel notifications, bounded by a short grace period.
    ///
    /// Notifications are still accepted afterwards; call this once the transport
    /// is no longer used, before the runtime goes away.
    pub async fn shutdown(&self) {
        self.notifications.close();
        let pending = self.notifications.len();
        if pending == 0 {
            return;
        }

        tracing::debug!(pending, "Waiting for cancel notifications");
        if tokio::time::timeout(SHUTDOWN_GRACE, self.notifications.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                pending = self.notifications.len(),
                "Gave up waiting for cancel notifications"
            );
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call(
        &self,
        id: u64,
        request: &ToolCallRequest,
    ) -> Result<ToolCallResult, OperationError> {
        let payload = json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "method": "tools/call",
            "params": {
                "name": request.name,
                "arguments": request.arguments,
            },
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OperationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| OperationError::Decode(e.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(OperationError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        envelope.result.ok_or_else(|| {
            OperationError::Decode("response has neither result nor error".to_string())
        })
    }

    /// Tell the server to stop working on `id` (fire and forget).
    fn notify_cancelled(&self, id: u64) {
        if !self.config.notify_on_cancel {
            return;
        }

        let request = self.client.post(&self.config.endpoint).json(&json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": "notifications/cancelled",
            "params": {
                "requestId": id,
                "reason": "Cancelled by client",
            },
        }));

        self.notifications.spawn(async move {
            if let Err(e) = request.send().await {
                tracing::warn!(request_id = id, error = %e, "Failed to send cancel notification");
            }
        });
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(
        &self,
        request: &ToolCallRequest,
        cancel: CancellationToken,
    ) -> Result<ToolCallResult, OperationError> {
        if cancel.is_cancelled() {
            return Err(OperationError::Cancelled);
        }

        let id = self.next_request_id();
        tracing::debug!(
            request_id = id,
            tool = %request.name,
            endpoint = %self.config.endpoint,
            "Sending tools/call"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(request_id = id, "Dropping in-flight tools/call");
                self.notify_cancelled(id);
                Err(OperationError::Cancelled)
            }
            result = self.call(id, request) => result,
        }
    }
}
