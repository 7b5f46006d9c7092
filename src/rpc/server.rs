//! JSON-RPC server over stdin/stdout.
//!
//! Requests are handled on the calling thread. Render events arrive from the
//! render thread and are written as notifications by a forwarder thread;
//! every message is one line, so responses and notifications never interleave
//! within a line.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::DaemonConfig;
use crate::error::Result;
use crate::generation::{PanelBoard, RenderEvent, RenderWorker};
use crate::telemetry::SamplerHandle;

use super::methods::handle_request;
use super::types::{
    event_notification, JsonRpcError, JsonRpcNotification, JsonRpcReply, JsonRpcRequest,
    INVALID_REQUEST, JSONRPC_VERSION, PARSE_ERROR,
};

/// State shared across all request handlers.
pub struct ServerState {
    /// Handle to the render thread.
    pub worker: RenderWorker,
    /// Panels holding staged jobs.
    pub board: PanelBoard,
    /// Running telemetry sampler, if one was started.
    pub telemetry: Option<SamplerHandle>,
    /// Daemon configuration.
    pub config: DaemonConfig,
    /// Flag to signal server shutdown.
    shutdown: Arc<AtomicBool>,
}

impl ServerState {
    /// Creates new server state.
    pub fn new(worker: RenderWorker, config: DaemonConfig) -> Self {
        Self {
            worker,
            board: PanelBoard::new(),
            telemetry: None,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attaches the telemetry sampler.
    pub fn with_telemetry(mut self, telemetry: SamplerHandle) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Runs the JSON-RPC server, reading from stdin and writing to stdout.
///
/// Returns when stdin closes or a `shutdown` request is handled.
pub fn run_server(state: &mut ServerState) -> Result<()> {
    let stdin = io::stdin();
    let reader = stdin.lock();

    info!("JSON-RPC server started, waiting for requests");

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "error reading stdin");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = process_request(&line, state) {
            write_line(&response);
        }

        if state.is_shutdown() {
            info!("server shutdown requested");
            break;
        }
    }

    info!("JSON-RPC server stopped");
    Ok(())
}

/// Handles one request line and returns the reply line, if any.
fn process_request(line: &str, state: &mut ServerState) -> Option<String> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            let error = JsonRpcError::new(PARSE_ERROR, format!("Invalid JSON: {}", e));
            return Some(JsonRpcReply::failure(None, error).to_line());
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        let error = JsonRpcError::new(INVALID_REQUEST, "Invalid JSON-RPC version (expected 2.0)");
        return Some(JsonRpcReply::failure(request.id, error).to_line());
    }

    debug!(method = %request.method, "handling request");
    let outcome = handle_request(&request.method, request.params, state);
    // Calls without an id are client notifications.
    let id = request.id?;
    let reply = match outcome {
        Ok(result) => JsonRpcReply::success(Some(id), result),
        Err(error) => JsonRpcReply::failure(Some(id), error),
    };
    Some(reply.to_line())
}

/// Sends a JSON-RPC notification to stdout.
pub fn send_notification<T: serde::Serialize>(method: &'static str, params: T) {
    let params = serde_json::to_value(params).unwrap_or(serde_json::Value::Null);
    if let Ok(json) = serde_json::to_string(&JsonRpcNotification::new(method, params)) {
        write_line(&json);
    }
}

/// Forwards every render event to stdout as a notification.
///
/// The thread ends once all event senders are gone, i.e. after the render
/// worker has shut down.
pub fn spawn_notification_forwarder(events: Receiver<RenderEvent>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("rpc-notify".to_string())
        .spawn(move || {
            for event in events {
                let notification = event_notification(&event);
                if let Ok(json) = serde_json::to_string(&notification) {
                    write_line(&json);
                }
            }
            debug!("notification forwarder stopped");
        })
}

fn write_line(line: &str) {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line).ok();
    stdout.flush().ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::test_support::StubPipeline;
    use crate::generation::{Orchestrator, RenderSettings};

    fn test_state(dir: &std::path::Path) -> ServerState {
        let (orchestrator, _rx) =
            Orchestrator::new(Box::new(StubPipeline::new()), RenderSettings::new(dir));
        ServerState::new(RenderWorker::spawn(orchestrator), DaemonConfig::default())
    }

    #[test]
    fn server_state_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        assert!(!state.is_shutdown());
        state.shutdown();
        assert!(state.is_shutdown());
        assert!(state.telemetry.is_none());
    }

    #[test]
    fn process_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let response = process_request("not json", &mut state).unwrap();
        assert!(response.contains("-32700")); // Parse error
    }

    #[test]
    fn process_invalid_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let request = r#"{"jsonrpc":"1.0","method":"ping","id":1}"#;
        let response = process_request(request, &mut state).unwrap();
        assert!(response.contains("-32600")); // Invalid request
    }

    #[test]
    fn process_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let request = r#"{"jsonrpc":"2.0","method":"unknown","id":1}"#;
        let response = process_request(request, &mut state).unwrap();
        assert!(response.contains("-32601")); // Method not found
    }

    #[test]
    fn process_ping_echoes_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        let request = r#"{"jsonrpc":"2.0","method":"ping","id":"abc"}"#;
        let response: serde_json::Value =
            serde_json::from_str(&process_request(request, &mut state).unwrap()).unwrap();
        assert_eq!(response["id"], "abc");
        assert_eq!(response["result"]["status"], "ok");
    }

    #[test]
    fn call_without_id_gets_no_reply() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(dir.path());
        assert!(process_request(r#"{"jsonrpc":"2.0","method":"shutdown"}"#, &mut state).is_none());
        assert!(state.is_shutdown());
    }

    #[test]
    fn forwarder_ends_when_senders_drop() {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = spawn_notification_forwarder(rx).unwrap();
        tx.send(RenderEvent::QueueChanged { length: 1 }).unwrap();
        drop(tx);
        handle.join().unwrap();
    }
}
