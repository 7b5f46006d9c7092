//! Render orchestrator.
//!
//! Drains the [`RenderQueue`] one job at a time through the single owned
//! [`PipelineAdapter`]. For every job it renders `video_count` videos with
//! seeds `base + repetition`, post-processes each artifact, and reports
//! progress, ETA and completion on the event stream.
//!
//! State machine:
//!
//! ```text
//! Idle -> DependencyCheck -> Running(job) -> Running(next) ... -> Completed -> Idle
//!              |                  |
//!              +-----> Failed <---+        (queue kept, resume re-enters)
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{CineError, Result};
use crate::pipeline::{
    DependencySetup, NoSetup, PassThrough, PipelineAdapter, PipelineError, PostProcessor,
    VideoRequest, EXPORT_FPS, VIDEO_HEIGHT, VIDEO_WIDTH,
};
use crate::types::{GenerationResult, Job};

use super::eta;
use super::events::{EventSink, JobRef, OrchestratorState, RenderEvent};
use super::progress::StepThrottle;
use super::queue::{lock_queue, RenderQueue, SharedQueue};
use super::stop::{StopMode, StopSignal};

/// Base seed used when a job does not carry its own.
pub const DEFAULT_BASE_SEED: u64 = 42;

/// Where and how videos are rendered.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub output_dir: PathBuf,
    pub base_seed: u64,
}

impl RenderSettings {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            base_seed: DEFAULT_BASE_SEED,
        }
    }

    pub fn with_base_seed(mut self, base_seed: u64) -> Self {
        self.base_seed = base_seed;
        self
    }
}

/// How a batch ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub jobs_completed: u32,
    /// Set when a stop request ended the batch early.
    pub stopped: Option<StopMode>,
    /// Jobs left in the queue.
    pub remaining: usize,
}

enum JobOutcome {
    Completed,
    Cancelled,
}

/// Sequential render engine.
pub struct Orchestrator {
    pipeline: Box<dyn PipelineAdapter>,
    post: Box<dyn PostProcessor>,
    setup: Box<dyn DependencySetup>,
    queue: SharedQueue,
    events: EventSink,
    stop: StopSignal,
    state: watch::Sender<OrchestratorState>,
    /// Raised by a controller that has handed a batch over; lowered once the
    /// state reflects it or the batch is refused.
    submitted: Arc<AtomicBool>,
    settings: RenderSettings,
}

impl Orchestrator {
    /// Creates an orchestrator that owns `pipeline` and returns the receiving
    /// end of its event stream.
    pub fn new(
        pipeline: Box<dyn PipelineAdapter>,
        settings: RenderSettings,
    ) -> (Self, Receiver<RenderEvent>) {
        let (sender, receiver) = mpsc::channel();
        let events = EventSink::new(sender);
        let queue = Arc::new(Mutex::new(RenderQueue::with_events(events.clone())));
        let (state, _) = watch::channel(OrchestratorState::Idle);

        let orchestrator = Self {
            pipeline,
            post: Box::new(PassThrough),
            setup: Box::new(NoSetup),
            queue,
            events,
            stop: StopSignal::new(),
            state,
            submitted: Arc::new(AtomicBool::new(false)),
            settings,
        };
        (orchestrator, receiver)
    }

    pub fn with_post_processor(mut self, post: impl PostProcessor + 'static) -> Self {
        self.post = Box::new(post);
        self
    }

    pub fn with_setup(mut self, setup: impl DependencySetup + 'static) -> Self {
        self.setup = Box::new(setup);
        self
    }

    pub fn queue(&self) -> SharedQueue {
        Arc::clone(&self.queue)
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn submission_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.submitted)
    }

    pub fn state(&self) -> OrchestratorState {
        self.state.borrow().clone()
    }

    /// Receiver that always holds the latest state.
    pub fn subscribe_state(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Appends a job to the render queue.
    pub fn enqueue(&self, job: Job) {
        lock_queue(&self.queue).enqueue(job);
    }

    /// Runs the dependency check, then renders until the queue is empty, a
    /// job fails, or a stop request takes effect.
    ///
    /// A previous `Failed` or `Completed` state is reset to `Idle` first.
    /// Stop requests made before the call are honoured; whoever submits the
    /// batch clears the signal beforehand.
    pub fn run_batch(&mut self) -> Result<BatchSummary> {
        let current = self.state();
        if current.is_busy() {
            return Err(self.refuse(CineError::InvalidState(format!(
                "a batch is in progress ({})",
                current.name()
            ))));
        }
        if !lock_queue(&self.queue).has_items() {
            return Err(self.refuse(CineError::InvalidState(
                "render queue is empty".to_string(),
            )));
        }

        if current != OrchestratorState::Idle {
            self.transition(OrchestratorState::Idle);
        }

        self.transition(OrchestratorState::DependencyCheck);
        if let Err(e) = self.run_setup() {
            return Err(self.fail(e, None));
        }

        self.render_loop()
    }

    /// Re-enters the render loop with the preserved queue after a failure.
    pub fn resume(&mut self) -> Result<BatchSummary> {
        let current = self.state();
        if !current.is_failed() {
            return Err(self.refuse(CineError::InvalidState(format!(
                "resume requires a failed batch, current state is {}",
                current.name()
            ))));
        }
        info!(remaining = lock_queue(&self.queue).len(), "resuming batch");
        self.run_batch()
    }

    /// Releases the pipeline.
    pub fn teardown(&mut self) {
        if self.pipeline.is_loaded() {
            info!(pipeline = self.pipeline.name(), "unloading pipeline");
            self.pipeline.unload();
        }
    }

    fn run_setup(&mut self) -> Result<()> {
        let events = self.events.clone();
        self.setup.run(&mut |done, total| {
            if total > 0 {
                let percent = (u64::from(done.min(total)) * 100 / u64::from(total)) as u8;
                events.emit(RenderEvent::SetupProgress { percent });
            }
        })
    }

    fn render_loop(&mut self) -> Result<BatchSummary> {
        let mut jobs_completed = 0;

        loop {
            if let Some(mode) = self.stop.requested() {
                return Ok(self.halt(mode, jobs_completed));
            }

            let next = lock_queue(&self.queue).peek().map(JobRef::from);
            let Some(next) = next else { break };

            if !self.pipeline.is_loaded() {
                info!(pipeline = self.pipeline.name(), "loading pipeline");
                if let Err(e) = self.pipeline.load() {
                    let err = CineError::PipelineExecution {
                        project_name: next.project_name.clone(),
                        sequence_number: next.sequence_number,
                        message: e.to_string(),
                    };
                    return Err(self.fail(err, Some(next)));
                }
            }

            let job = match lock_queue(&self.queue).dequeue() {
                Some(job) => job,
                None => break,
            };
            let job_ref = JobRef::from(&job);

            match self.render_job(job) {
                Ok(JobOutcome::Completed) => jobs_completed += 1,
                Ok(JobOutcome::Cancelled) => {
                    return Ok(self.halt(StopMode::Forceful, jobs_completed));
                }
                Err(e) => return Err(self.fail(e, Some(job_ref))),
            }
        }

        self.transition(OrchestratorState::Completed);
        self.events.emit(RenderEvent::BatchCompleted {
            jobs: jobs_completed,
        });
        self.transition(OrchestratorState::Idle);
        info!(jobs = jobs_completed, "batch completed");

        Ok(BatchSummary {
            jobs_completed,
            stopped: None,
            remaining: lock_queue(&self.queue).len(),
        })
    }

    fn render_job(&mut self, mut job: Job) -> Result<JobOutcome> {
        job.set_rendering();
        let job_ref = JobRef::from(&job);
        self.transition(OrchestratorState::Running {
            job: job_ref.clone(),
        });
        info!(
            project = %job.project_name,
            sequence = job.sequence_number,
            videos = job.video_count,
            "rendering job"
        );
        self.events.emit(RenderEvent::JobStarted {
            job: job_ref.clone(),
            video_count: job.video_count,
        });
        self.events.emit(RenderEvent::JobProgress {
            job: job_ref.clone(),
            percent: 0,
        });

        let started = Instant::now();
        let mut results = Vec::with_capacity(job.video_count as usize);
        // Final videos of this job; an aborted job leaves none behind.
        let mut written: Vec<PathBuf> = Vec::with_capacity(job.video_count as usize);

        for repetition in 0..job.video_count {
            if self.stop.is_forceful() {
                remove_partial(&written);
                job.set_cancelled();
                warn!(job = %job.label(), "render aborted");
                return Ok(JobOutcome::Cancelled);
            }

            let index = repetition + 1;
            let seed = job.seed_for(repetition, self.settings.base_seed);
            let raw_path = self.settings.output_dir.join(job.temp_file_name(index));
            let final_path = self.settings.output_dir.join(job.output_file_name(index));
            let video_started = Instant::now();

            match self.render_video(&job, &job_ref, index, seed, &raw_path, &final_path) {
                Ok(()) => {}
                Err(PipelineError::Cancelled) => {
                    remove_partial(&[&raw_path, &final_path]);
                    remove_partial(&written);
                    job.set_cancelled();
                    warn!(job = %job.label(), video = index, "render aborted");
                    return Ok(JobOutcome::Cancelled);
                }
                Err(e) => {
                    remove_partial(&[&raw_path, &final_path]);
                    job.set_failed();
                    return Err(CineError::PipelineExecution {
                        project_name: job.project_name.clone(),
                        sequence_number: job.sequence_number,
                        message: e.to_string(),
                    });
                }
            }

            written.push(final_path.clone());
            let elapsed = video_started.elapsed();
            job.record_video();
            debug!(
                job = %job.label(),
                video = index,
                elapsed_sec = elapsed.as_secs_f64(),
                "video completed"
            );

            self.events.emit(RenderEvent::VideoCompleted {
                job: job_ref.clone(),
                video: index,
                path: final_path.clone(),
                elapsed_sec: elapsed.as_secs_f64(),
            });
            self.events.emit(RenderEvent::JobProgress {
                job: job_ref.clone(),
                percent: job.progress_percent(),
            });
            if let Some(estimate) =
                eta::estimate(started.elapsed(), job.completed_videos, job.video_count)
            {
                self.events.emit(RenderEvent::JobEta {
                    job: job_ref.clone(),
                    remaining_sec: estimate.remaining.as_secs_f64(),
                    text: estimate.text(),
                });
            }

            results.push(GenerationResult::success(final_path, elapsed, seed));
        }

        job.set_complete();
        let elapsed = started.elapsed();
        info!(
            job = %job.label(),
            elapsed_sec = elapsed.as_secs_f64(),
            "job completed"
        );
        self.events.emit(RenderEvent::JobCompleted {
            job: job_ref,
            results,
            elapsed_sec: elapsed.as_secs_f64(),
        });
        Ok(JobOutcome::Completed)
    }

    fn render_video(
        &mut self,
        job: &Job,
        job_ref: &JobRef,
        index: u32,
        seed: u64,
        raw_path: &Path,
        final_path: &Path,
    ) -> std::result::Result<(), PipelineError> {
        fs::create_dir_all(&self.settings.output_dir)?;

        let request = VideoRequest {
            prompt: job.prompt.clone(),
            inference_steps: job.inference_steps,
            guidance_scale: job.guidance_scale,
            num_frames: job.num_frames,
            seed,
            width: VIDEO_WIDTH,
            height: VIDEO_HEIGHT,
            fps: EXPORT_FPS,
            output_path: raw_path.to_path_buf(),
            cancel: self.stop.token(),
        };

        let events = self.events.clone();
        let mut throttle = StepThrottle::new();
        let written = self.pipeline.generate(&request, &mut |step, total_steps| {
            if let Some(percent) = throttle.observe(step, total_steps) {
                events.emit(RenderEvent::VideoProgress {
                    job: job_ref.clone(),
                    video: index,
                    step,
                    total_steps,
                    percent,
                });
            }
        })?;

        if self.stop.is_forceful() {
            remove_partial(&[&written]);
            return Err(PipelineError::Cancelled);
        }

        self.post.process(&written, final_path)
    }

    /// Ends the batch on a stop request. The queue is kept.
    fn halt(&mut self, mode: StopMode, jobs_completed: u32) -> BatchSummary {
        let remaining = lock_queue(&self.queue).len();
        info!(?mode, remaining, "batch stopped");
        self.transition(OrchestratorState::Idle);
        self.events.emit(RenderEvent::Stopped { mode, remaining });
        BatchSummary {
            jobs_completed,
            stopped: Some(mode),
            remaining,
        }
    }

    /// Moves to `Failed` and reports `err`, which is handed back to the caller.
    fn fail(&mut self, err: CineError, job: Option<JobRef>) -> CineError {
        error!(code = %err.code(), error = %err, "batch halted");
        self.transition(OrchestratorState::Failed {
            message: err.to_string(),
        });
        self.events.emit(RenderEvent::Error {
            code: err.code().as_str().to_string(),
            message: err.to_string(),
            job,
        });
        err
    }

    /// Drops a submitted batch that will not run.
    fn refuse(&self, err: CineError) -> CineError {
        self.submitted.store(false, Ordering::SeqCst);
        err
    }

    fn transition(&mut self, next: OrchestratorState) {
        debug!(from = self.state.borrow().name(), to = next.name(), "state change");
        let busy = next.is_busy();
        self.state.send_replace(next.clone());
        if busy {
            self.submitted.store(false, Ordering::SeqCst);
        }
        self.events.emit(RenderEvent::StateChanged { state: next });
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Deletes artifacts of an aborted or failed video. Missing files are fine.
fn remove_partial<P: AsRef<Path>>(paths: &[P]) {
    for path in paths.iter().map(AsRef::as_ref) {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed partial artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial artifact"),
        }
    }
}
