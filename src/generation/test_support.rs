//! Stub collaborators shared by the orchestrator and worker tests.

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{CineError, Result};
use crate::pipeline::{DependencySetup, PipelineAdapter, PipelineError, VideoRequest};
use crate::types::{Job, JobRequest};

use super::events::RenderEvent;
use super::stop::{StopMode, StopSignal};

/// Prompt that makes [`StubPipeline`] fail.
pub const FAILING_PROMPT: &str = "FAIL";

/// Pipeline stub that writes a small file per video.
///
/// Reports four progress steps, sleeps briefly so elapsed times are
/// non-zero, and fails for prompts equal to [`FAILING_PROMPT`].
pub struct StubPipeline {
    pub loaded: bool,
    pub load_fails: bool,
    /// Stop requested from inside the `generate` call numbered `stop_on_call`.
    pub stop_during: Option<(StopSignal, StopMode)>,
    pub stop_on_call: u32,
    calls: u32,
    pub seeds: Arc<Mutex<Vec<u64>>>,
    pub unloads: Arc<Mutex<u32>>,
}

impl StubPipeline {
    pub fn new() -> Self {
        Self {
            loaded: false,
            load_fails: false,
            stop_during: None,
            stop_on_call: 1,
            calls: 0,
            seeds: Arc::new(Mutex::new(Vec::new())),
            unloads: Arc::new(Mutex::new(0)),
        }
    }
}

impl PipelineAdapter for StubPipeline {
    fn name(&self) -> &str {
        "stub"
    }

    fn load(&mut self) -> std::result::Result<(), PipelineError> {
        if self.load_fails {
            return Err(PipelineError::Load("weights missing".to_string()));
        }
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn generate(
        &mut self,
        request: &VideoRequest,
        on_progress: &mut dyn FnMut(u32, u32),
    ) -> std::result::Result<PathBuf, PipelineError> {
        self.seeds.lock().unwrap().push(request.seed);
        if request.prompt == FAILING_PROMPT {
            return Err(PipelineError::Generation("CUDA out of memory".to_string()));
        }

        fs::write(&request.output_path, b"frames")?;
        for step in 1..=4 {
            on_progress(step, 4);
        }
        std::thread::sleep(Duration::from_millis(2));

        self.calls += 1;
        if self.calls == self.stop_on_call {
            if let Some((stop, mode)) = self.stop_during.take() {
                stop.request(mode);
            }
        }
        if request.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(request.output_path.clone())
    }

    fn unload(&mut self) {
        self.loaded = false;
        *self.unloads.lock().unwrap() += 1;
    }
}

/// Setup stub that always fails.
pub struct FailingSetup;

impl DependencySetup for FailingSetup {
    fn run(&mut self, on_progress: &mut dyn FnMut(u32, u32)) -> Result<()> {
        on_progress(1, 3);
        Err(CineError::DependencySetup(
            "generation service unreachable".to_string(),
        ))
    }
}

/// Setup stub that blocks until the test sends on (or drops) its channel.
pub struct GatedSetup {
    pub release: Receiver<()>,
}

impl DependencySetup for GatedSetup {
    fn run(&mut self, on_progress: &mut dyn FnMut(u32, u32)) -> Result<()> {
        self.release.recv().ok();
        on_progress(1, 1);
        Ok(())
    }
}

pub fn job(panel_id: u32, project: &str, sequence: u32, videos: u32) -> Job {
    Job::new(
        panel_id,
        sequence,
        JobRequest::new(project, "waves breaking on a pier").with_video_count(videos),
    )
    .unwrap()
}

pub fn failing_job(panel_id: u32, project: &str, sequence: u32) -> Job {
    Job::new(panel_id, sequence, JobRequest::new(project, FAILING_PROMPT)).unwrap()
}

/// File names of completed videos, in event order.
pub fn completed_files(events: &[RenderEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RenderEvent::VideoCompleted { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string()),
            _ => None,
        })
        .collect()
}

/// Labels of completed jobs, in event order.
pub fn completed_jobs(events: &[RenderEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RenderEvent::JobCompleted { job, .. } => {
                Some(format!("{}_{}", job.project_name, job.sequence_number))
            }
            _ => None,
        })
        .collect()
}

/// Labels of started jobs, in event order.
pub fn started_jobs(events: &[RenderEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RenderEvent::JobStarted { job, .. } => {
                Some(format!("{}_{}", job.project_name, job.sequence_number))
            }
            _ => None,
        })
        .collect()
}
