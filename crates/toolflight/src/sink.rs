//! Result and error sinks - where settled operations are reported.
//!
//! Both sinks are fire-and-forget: the invoker never consumes a return value.

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::outcome::{OperationError, ToolCallResult};

/// Receives the result of every authoritative settlement.
pub trait ResultSink: Send + Sync {
    fn receive_result(&self, result: ToolCallResult);
}

/// Tracks error state per category (drives an error banner in a UI).
pub trait ErrorSink: Send + Sync {
    fn record_error(&self, category: &str, error: &OperationError);
    fn clear_error(&self, category: &str);
}

impl ResultSink for mpsc::UnboundedSender<ToolCallResult> {
    fn receive_result(&self, result: ToolCallResult) {
        if self.send(result).is_err() {
            tracing::debug!("Result receiver dropped, discarding result");
        }
    }
}

/// Last error message per category.
#[derive(Debug, Default)]
pub struct ErrorRegistry {
    errors: DashMap<String, String>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: &str) -> Option<String> {
        self.errors.get(category).map(|e| e.value().clone())
    }

    pub fn contains(&self, category: &str) -> bool {
        self.errors.contains_key(category)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self.errors.iter().map(|e| e.key().clone()).collect();
        categories.sort();
        categories
    }
}

impl ErrorSink for ErrorRegistry {
    fn record_error(&self, category: &str, error: &OperationError) {
        self.errors.insert(category.to_string(), error.to_string());
    }

    fn clear_error(&self, category: &str) {
        self.errors.remove(category);
    }
}
