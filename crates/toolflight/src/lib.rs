//! toolflight: single-flight, cancellable tool call invoker.

mod invoker;
mod operation;
mod outcome;

pub mod sink;
pub mod telemetry;
pub mod transport;

pub use invoker::{ActiveWatch, DEFAULT_ERROR_CATEGORY, Invoker, InvokerConfig};
pub use operation::{CancellationToken, OperationToken};
pub use outcome::{
    CANCELLED_MESSAGE, ContentPart, OperationError, Outcome, Params, ResourceContent,
    ToolCallRequest, ToolCallResult,
};
pub use sink::{ErrorRegistry, ErrorSink, ResultSink};
pub use transport::{HttpTransport, HttpTransportConfig, Transport};

/// toolflight version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
