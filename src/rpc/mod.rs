//! JSON-RPC module for daemon communication.
//!
//! Methods:
//! - `ping`: Health check
//! - `stage`: Validate a job request and stage it on a panel
//! - `process`: Move every staged job into the render queue and start a batch
//! - `clear`: Empty the render queue and the panels
//! - `cancel`: Stop the running batch (`graceful` or `force`)
//! - `resume`: Continue a failed batch with the jobs still queued
//! - `status`: Orchestrator state and queue contents
//! - `telemetry`: Latest telemetry snapshot
//! - `shutdown`: Graceful shutdown
//!
//! Every render event is forwarded as a notification named after the event,
//! e.g. `queue_changed`, `job_progress`, `job_eta`, `job_completed`,
//! `batch_completed`, `stopped` and `error`.

pub mod methods;
pub mod server;
pub mod types;

pub use server::{run_server, send_notification, spawn_notification_forwarder, ServerState};
pub use types::{
    event_notification, CancelParams, ClearResult, JsonRpcError, JsonRpcNotification,
    JsonRpcReply, JsonRpcRequest, ProcessResult, RequestId, StageParams, StageResult,
    StatusResult,
};
