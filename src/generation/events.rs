//! Events emitted by the render queue and orchestrator.
//!
//! Every consumer (CLI printer, JSON-RPC notification forwarder, tests)
//! receives the same stream over a `std::sync::mpsc` channel.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use serde::Serialize;

use crate::types::{GenerationResult, Job};

use super::stop::StopMode;

/// Identifies the job an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRef {
    pub panel_id: u32,
    pub project_name: String,
    pub sequence_number: u32,
}

impl From<&Job> for JobRef {
    fn from(job: &Job) -> Self {
        Self {
            panel_id: job.panel_id,
            project_name: job.project_name.clone(),
            sequence_number: job.sequence_number,
        }
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.project_name, self.sequence_number)
    }
}

/// Render orchestrator state.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    #[default]
    Idle,
    DependencyCheck,
    Running { job: JobRef },
    Completed,
    Failed { message: String },
}

impl OrchestratorState {
    /// True while a batch owns the render loop.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            OrchestratorState::DependencyCheck | OrchestratorState::Running { .. }
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, OrchestratorState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::DependencyCheck => "dependency_check",
            OrchestratorState::Running { .. } => "running",
            OrchestratorState::Completed => "completed",
            OrchestratorState::Failed { .. } => "failed",
        }
    }
}

/// A render lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RenderEvent {
    /// The queue was modified; carries the new length.
    QueueChanged { length: usize },

    StateChanged { state: OrchestratorState },

    /// Prerequisite setup progress, 0-100.
    SetupProgress { percent: u8 },

    JobStarted { job: JobRef, video_count: u32 },

    /// Step progress within one video, throttled to 5% increments.
    VideoProgress {
        job: JobRef,
        video: u32,
        step: u32,
        total_steps: u32,
        percent: u8,
    },

    /// Job progress as a whole percentage of rendered videos.
    JobProgress { job: JobRef, percent: u8 },

    JobEta {
        job: JobRef,
        remaining_sec: f64,
        text: String,
    },

    VideoCompleted {
        job: JobRef,
        video: u32,
        path: PathBuf,
        elapsed_sec: f64,
    },

    JobCompleted {
        job: JobRef,
        results: Vec<GenerationResult>,
        elapsed_sec: f64,
    },

    /// The queue drained; carries the number of jobs rendered in the batch.
    BatchCompleted { jobs: u32 },

    /// A stop request took effect; `remaining` jobs are still queued.
    Stopped { mode: StopMode, remaining: usize },

    /// A failure; `job` is set when the failure belongs to a job.
    Error {
        code: String,
        message: String,
        job: Option<JobRef>,
    },
}

impl RenderEvent {
    /// Snake-case event name, identical to the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            RenderEvent::QueueChanged { .. } => "queue_changed",
            RenderEvent::StateChanged { .. } => "state_changed",
            RenderEvent::SetupProgress { .. } => "setup_progress",
            RenderEvent::JobStarted { .. } => "job_started",
            RenderEvent::VideoProgress { .. } => "video_progress",
            RenderEvent::JobProgress { .. } => "job_progress",
            RenderEvent::JobEta { .. } => "job_eta",
            RenderEvent::VideoCompleted { .. } => "video_completed",
            RenderEvent::JobCompleted { .. } => "job_completed",
            RenderEvent::BatchCompleted { .. } => "batch_completed",
            RenderEvent::Stopped { .. } => "stopped",
            RenderEvent::Error { .. } => "error",
        }
    }

    /// True for events after which a batch is no longer running.
    pub fn ends_batch(&self) -> bool {
        matches!(
            self,
            RenderEvent::BatchCompleted { .. } | RenderEvent::Stopped { .. } | RenderEvent::Error { .. }
        )
    }
}

/// Sending half of the event stream.
///
/// Sends never fail from the producer's point of view: once the consumer is
/// gone, events are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Option<Sender<RenderEvent>>,
}

impl EventSink {
    pub fn new(sender: Sender<RenderEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink that discards everything.
    pub fn disconnected() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: RenderEvent) {
        if let Some(sender) = &self.sender {
            sender.send(event).ok();
        }
    }
}
