//! Tool call request/result types and settlement classification.

use serde::{Deserialize, Serialize};

/// Tool arguments.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Text shown when an operation settles as cancelled.
pub const CANCELLED_MESSAGE: &str = "Tool execution was cancelled";

/// A named tool call as handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Params,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: Params) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Result forwarded to the result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::text(text)],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::text(text)],
            is_error: true,
        }
    }

    /// Neutral result reported for a cancelled operation.
    pub fn cancelled() -> Self {
        Self::text(CANCELLED_MESSAGE)
    }

    /// Concatenated text parts, newline separated.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One part of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: ResourceContent,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// Failure of a tool call.
///
/// Classification is by variant: only `Cancelled` counts as a cancellation,
/// whatever the message text of the other variants says.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("Tool execution was cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error("{message}")]
    Rpc { code: i64, message: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl OperationError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Terminal outcome of one operation. Never stored; dispatched and dropped.
#[derive(Debug)]
pub enum Outcome {
    Success(ToolCallResult),
    Cancelled,
    Failed(OperationError),
}

impl Outcome {
    pub fn from_settlement(settlement: Result<ToolCallResult, OperationError>) -> Self {
        match settlement {
            Ok(result) => Self::Success(result),
            Err(e) if e.is_cancellation() => Self::Cancelled,
            Err(e) => Self::Failed(e),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success(_) => "succeeded",
            Self::Cancelled => "canceled",
            Self::Failed(_) => "failed",
        }
    }
}
