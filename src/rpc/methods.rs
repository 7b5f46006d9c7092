//! JSON-RPC method handlers.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::CineError;

use super::server::ServerState;
use super::types::{
    CancelParams, ClearResult, JsonRpcError, ProcessResult, StageParams, StageResult,
    StatusResult, INTERNAL_ERROR, INVALID_PARAMS,
};

/// Handles a JSON-RPC method call.
pub fn handle_request(
    method: &str,
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        "ping" => handle_ping(),
        "stage" => handle_stage(params, state),
        "process" => handle_process(state),
        "clear" => handle_clear(state),
        "cancel" => handle_cancel(params, state),
        "resume" => handle_resume(state),
        "status" => handle_status(state),
        "telemetry" => handle_telemetry(state),
        "shutdown" => handle_shutdown(state),
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))
}

fn to_value<T: Serialize>(result: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
}

/// Handles the ping method for health checks.
fn handle_ping() -> Result<serde_json::Value, JsonRpcError> {
    Ok(serde_json::json!({ "status": "ok" }))
}

/// Validates a job request and stages it on its panel.
fn handle_stage(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: StageParams = parse_params(params)?;
    let job = state.board.stage(params.panel_id, params.request)?;
    let staged = state
        .board
        .panel(params.panel_id)
        .map(|panel| panel.staged().len())
        .unwrap_or(0);

    to_value(StageResult {
        panel_id: job.panel_id,
        project_name: job.project_name,
        sequence_number: job.sequence_number,
        staged,
    })
}

/// Moves every staged job into the render queue and starts the batch.
fn handle_process(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    let queued = state.worker.process(&mut state.board)?;
    info!(jobs = queued, "batch submitted");
    to_value(ProcessResult { queued })
}

/// Empties the render queue and the panels. A job already rendering finishes.
fn handle_clear(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    let unstaged = state.board.staged_count();
    state.board.clear_staged();
    let cleared = state.worker.clear();
    to_value(ClearResult { cleared, unstaged })
}

fn handle_cancel(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: CancelParams = if params.is_null() {
        parse_params(serde_json::json!({}))?
    } else {
        parse_params(params)?
    };

    if !state.worker.is_busy() {
        return Err(CineError::InvalidState("no batch is running".to_string()).into());
    }
    state.worker.stop(params.mode);
    Ok(serde_json::json!({ "status": "stopping", "mode": params.mode }))
}

fn handle_resume(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    state.worker.resume()?;
    Ok(serde_json::json!({ "status": "resuming" }))
}

fn handle_status(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    to_value(StatusResult {
        state: state.worker.state(),
        queue_length: state.worker.queue_len(),
        queued: state.worker.queued_labels(),
        staged: state.board.staged_count(),
    })
}

/// Returns the latest telemetry snapshot.
fn handle_telemetry(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    let sampler = state.telemetry.as_ref().ok_or_else(|| {
        JsonRpcError::from(CineError::InvalidState(
            "telemetry sampler is not running".to_string(),
        ))
    })?;
    to_value(sampler.latest())
}

/// Handles the shutdown method.
fn handle_shutdown(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    state.shutdown();
    Ok(serde_json::json!({ "status": "shutting_down" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use crate::generation::test_support::{GatedSetup, StubPipeline};
    use crate::generation::{Orchestrator, RenderEvent, RenderSettings, RenderWorker};
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    fn test_state(dir: &std::path::Path) -> (ServerState, Receiver<RenderEvent>) {
        let (orchestrator, rx) =
            Orchestrator::new(Box::new(StubPipeline::new()), RenderSettings::new(dir));
        let state = ServerState::new(RenderWorker::spawn(orchestrator), DaemonConfig::default());
        (state, rx)
    }

    fn stage(state: &mut ServerState, panel: u32, project: &str) -> serde_json::Value {
        let params = serde_json::json!({
            "panel_id": panel,
            "project_name": project,
            "prompt": "lanterns over a canal",
            "inference_steps": 10
        });
        handle_request("stage", params, state).unwrap()
    }

    fn wait_for_batch(rx: &Receiver<RenderEvent>) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        loop {
            let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            let done = event.ends_batch();
            events.push(event);
            if done {
                return events;
            }
        }
    }

    #[test]
    fn handle_ping() {
        let value = super::handle_ping().unwrap();
        assert_eq!(value["status"], "ok");
    }

    #[test]
    fn handle_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());
        let err = handle_request("nonexistent", serde_json::Value::Null, &mut state).unwrap_err();
        assert_eq!(err.code, -32601);
    }

    #[test]
    fn stage_assigns_sequence_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());

        let first = stage(&mut state, 1, "canal");
        let second = stage(&mut state, 1, "canal");
        let other = stage(&mut state, 2, "dunes");

        assert_eq!(first["sequence_number"], 1);
        assert_eq!(second["sequence_number"], 2);
        assert_eq!(second["staged"], 2);
        assert_eq!(other["sequence_number"], 1);
    }

    #[test]
    fn stage_rejects_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());

        let params = serde_json::json!({ "panel_id": 1, "project_name": "", "prompt": "x" });
        let err = handle_request("stage", params, &mut state).unwrap_err();
        assert_eq!(err.code, -32000);
        assert_eq!(err.data.unwrap().error_code, "INVALID_INPUT");

        // The rejected request did not consume a sequence number.
        assert_eq!(stage(&mut state, 1, "canal")["sequence_number"], 1);
    }

    #[test]
    fn stage_rejects_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());
        let err = handle_request("stage", serde_json::json!({}), &mut state).unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[test]
    fn process_renders_staged_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, rx) = test_state(dir.path());
        stage(&mut state, 2, "dunes");
        stage(&mut state, 1, "canal");

        let result = handle_request("process", serde_json::Value::Null, &mut state).unwrap();
        assert_eq!(result["queued"], 2);

        let events = wait_for_batch(&rx);
        assert!(matches!(
            events.last(),
            Some(RenderEvent::BatchCompleted { jobs: 2 })
        ));
        assert!(dir.path().join("canal_1_video_1.mp4").exists());
        assert!(dir.path().join("dunes_1_video_1.mp4").exists());
    }

    #[test]
    fn process_without_staged_jobs_is_invalid_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());
        let err = handle_request("process", serde_json::Value::Null, &mut state).unwrap_err();
        assert_eq!(err.code, -32004);
    }

    #[test]
    fn status_reports_staged_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());
        stage(&mut state, 1, "canal");

        let status = handle_request("status", serde_json::Value::Null, &mut state).unwrap();
        assert_eq!(status["state"]["state"], "idle");
        assert_eq!(status["queue_length"], 0);
        assert_eq!(status["staged"], 1);
    }

    #[test]
    fn clear_drops_staged_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());
        stage(&mut state, 1, "canal");
        stage(&mut state, 2, "dunes");

        let result = handle_request("clear", serde_json::Value::Null, &mut state).unwrap();
        assert_eq!(result["unstaged"], 2);
        assert_eq!(result["cleared"], 0);
        assert_eq!(state.board.staged_count(), 0);
    }

    #[test]
    fn cancel_and_resume_need_matching_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());

        let err = handle_request("cancel", serde_json::json!({ "mode": "force" }), &mut state)
            .unwrap_err();
        assert_eq!(err.code, -32004);

        let err = handle_request("resume", serde_json::Value::Null, &mut state).unwrap_err();
        assert_eq!(err.code, -32004);

        let err = handle_request("cancel", serde_json::json!({ "mode": "later" }), &mut state)
            .unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[test]
    fn cancel_is_accepted_as_soon_as_process_returns() {
        let dir = tempfile::tempdir().unwrap();
        let (release_tx, release) = std::sync::mpsc::channel();
        let (orchestrator, rx) =
            Orchestrator::new(Box::new(StubPipeline::new()), RenderSettings::new(dir.path()));
        let orchestrator = orchestrator.with_setup(GatedSetup { release });
        let mut state =
            ServerState::new(RenderWorker::spawn(orchestrator), DaemonConfig::default());
        stage(&mut state, 1, "canal");

        handle_request("process", serde_json::Value::Null, &mut state).unwrap();
        let result =
            handle_request("cancel", serde_json::json!({ "mode": "force" }), &mut state).unwrap();
        assert_eq!(result["status"], "stopping");

        let err = handle_request("process", serde_json::Value::Null, &mut state).unwrap_err();
        assert_eq!(err.code, -32004);

        release_tx.send(()).unwrap();
        let events = wait_for_batch(&rx);
        assert!(matches!(
            events.last(),
            Some(RenderEvent::Stopped { remaining: 1, .. })
        ));
        assert!(!dir.path().join("canal_1_video_1.mp4").exists());
    }

    #[test]
    fn telemetry_without_sampler_is_invalid_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());
        let err = handle_request("telemetry", serde_json::Value::Null, &mut state).unwrap_err();
        assert_eq!(err.code, -32004);
    }

    #[test]
    fn handle_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, _rx) = test_state(dir.path());
        let result = super::handle_shutdown(&mut state).unwrap();
        assert_eq!(result["status"], "shutting_down");
        assert!(state.is_shutdown());
    }
}
