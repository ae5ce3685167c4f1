//! Typed message content payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flags sent with every `execute_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Don't broadcast output or increment the execution counter.
    pub silent: bool,
    /// Record the code in the kernel's history.
    pub store_history: bool,
    /// Expressions evaluated after the code runs.
    pub user_expressions: Option<Map<String, Value>>,
    /// Allow the kernel to prompt on stdin. This client never answers
    /// `input_request`, so leave it off unless another client does.
    pub allow_stdin: bool,
    /// Abort queued executions when this one raises.
    pub stop_on_error: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            silent: false,
            store_history: true,
            user_expressions: None,
            allow_stdin: false,
            stop_on_error: true,
        }
    }
}

/// `execute_request` content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub silent: bool,
    pub store_history: bool,
    pub user_expressions: Option<Map<String, Value>>,
    pub allow_stdin: bool,
    pub stop_on_error: bool,
}

impl ExecuteRequest {
    /// Build request content for `code` with the given flags.
    pub fn new(code: impl Into<String>, options: &ExecuteOptions) -> Self {
        Self {
            code: code.into(),
            silent: options.silent,
            store_history: options.store_history,
            user_expressions: options.user_expressions.clone(),
            allow_stdin: options.allow_stdin,
            stop_on_error: options.stop_on_error,
        }
    }
}

/// Kernel execution state reported by `status` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Busy,
    Idle,
    Starting,
    /// Any state this client doesn't know about.
    #[serde(other)]
    Unknown,
}

/// `status` content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusContent {
    pub execution_state: ExecutionState,
}

/// `stream` content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamContent {
    /// `stdout` or `stderr`.
    pub name: String,
    pub text: String,
}

/// `error` content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContent {
    pub ename: String,
    pub evalue: String,
    #[serde(default)]
    pub traceback: Vec<String>,
}

/// `display_data` content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayDataContent {
    /// MIME type to payload.
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// `execute_result` content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResultContent {
    pub execution_count: Option<u64>,
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}
