//! JSON-RPC types for the daemon protocol.

use serde::{Deserialize, Serialize};

use crate::error::{CineError, ErrorCode};
use crate::generation::{OrchestratorState, RenderEvent, StopMode};
use crate::types::JobRequest;

/// Protocol version carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Identifier a client attaches to a call, echoed in the reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    Text(String),
}

/// One call read from stdin. Calls without an `id` get no reply.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Reply line for one call. Holds exactly one of `result` or `error`.
#[derive(Debug, Serialize)]
pub struct JsonRpcReply {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    #[serde(flatten)]
    pub outcome: ReplyOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyOutcome {
    Result(serde_json::Value),
    Error(JsonRpcError),
}

impl JsonRpcReply {
    pub fn success(id: Option<RequestId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: ReplyOutcome::Result(result),
        }
    }

    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: ReplyOutcome::Error(error),
        }
    }

    /// Serialized form, one line.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Error member of a failed reply.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonRpcErrorData>,
}

/// Daemon error details attached to application errors.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorData {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_hint: Option<String>,
}

impl JsonRpcError {
    /// Protocol-level error without daemon details.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }
}

/// Code in the -32000 server range for each daemon error.
pub fn application_code(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::InvalidInput => -32000,
        ErrorCode::DependencySetupFailed => -32001,
        ErrorCode::PipelineFailed => -32002,
        ErrorCode::TelemetryQueryFailed => -32003,
        ErrorCode::InvalidState => -32004,
        ErrorCode::InvalidConfig => -32005,
        ErrorCode::Io => -32006,
    }
}

impl From<&CineError> for JsonRpcError {
    fn from(err: &CineError) -> Self {
        let code = err.code();
        Self {
            code: application_code(code),
            message: code.description().to_string(),
            data: Some(JsonRpcErrorData {
                error_code: code.as_str().to_string(),
                details: Some(err.to_string()),
                recovery_hint: Some(code.recovery_hint().to_string()),
            }),
        }
    }
}

impl From<CineError> for JsonRpcError {
    fn from(err: CineError) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// Method parameters and results
// ============================================================================

/// Parameters for `stage`: the panel plus the job fields.
#[derive(Debug, Deserialize)]
pub struct StageParams {
    pub panel_id: u32,
    #[serde(flatten)]
    pub request: JobRequest,
}

#[derive(Debug, Serialize)]
pub struct StageResult {
    pub panel_id: u32,
    pub project_name: String,
    pub sequence_number: u32,
    /// Jobs staged on this panel, including the new one.
    pub staged: usize,
}

#[derive(Debug, Serialize)]
pub struct ProcessResult {
    /// Jobs moved from the panels into the render queue.
    pub queued: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearResult {
    /// Jobs removed from the render queue.
    pub cleared: usize,
    /// Jobs removed from the panels.
    pub unstaged: usize,
}

/// Parameters for `cancel`. The mode defaults to graceful.
#[derive(Debug, Deserialize)]
pub struct CancelParams {
    #[serde(default = "default_stop_mode")]
    pub mode: StopMode,
}

fn default_stop_mode() -> StopMode {
    StopMode::Graceful
}

#[derive(Debug, Serialize)]
pub struct StatusResult {
    pub state: OrchestratorState,
    pub queue_length: usize,
    /// Labels of the queued jobs, head first.
    pub queued: Vec<String>,
    /// Jobs staged on panels and not yet processed.
    pub staged: usize,
}

// ============================================================================
// Notifications
// ============================================================================

/// Message pushed to the client without a preceding call.
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: serde_json::Value,
}

impl JsonRpcNotification {
    pub fn new(method: &'static str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Turns a render event into a notification named after the event.
///
/// The params are the event's fields without the `event` tag.
pub fn event_notification(event: &RenderEvent) -> JsonRpcNotification {
    let mut params = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
    if let Some(fields) = params.as_object_mut() {
        fields.remove("event");
    }
    JsonRpcNotification::new(event.name(), params)
}
