//! Background render thread.
//!
//! The orchestrator lives on its own thread and is driven through a command
//! channel. The handle keeps the shared queue, the stop signal and a state
//! watch so callers can inspect and steer a batch without blocking on it.
//!
//! A submitted batch counts as busy from the moment the command is accepted,
//! before the render thread has picked it up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{CineError, Result};
use crate::types::Job;

use super::events::OrchestratorState;
use super::orchestrator::Orchestrator;
use super::panel::PanelBoard;
use super::queue::{lock_queue, SharedQueue};
use super::stop::{StopMode, StopSignal};

/// Message sent to the render thread.
#[derive(Debug)]
enum WorkerMessage {
    RunBatch,
    Resume,
    Shutdown,
}

/// Handle to the render thread.
pub struct RenderWorker {
    sender: Sender<WorkerMessage>,
    thread_handle: Option<JoinHandle<()>>,
    queue: SharedQueue,
    stop: StopSignal,
    state: watch::Receiver<OrchestratorState>,
    /// Set when a batch command is accepted, cleared by the orchestrator once
    /// its state shows the batch.
    pending: Arc<AtomicBool>,
}

impl RenderWorker {
    /// Moves `orchestrator` onto a new thread.
    pub fn spawn(orchestrator: Orchestrator) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerMessage>();
        let queue = orchestrator.queue();
        let stop = orchestrator.stop_signal();
        let state = orchestrator.subscribe_state();
        let pending = orchestrator.submission_flag();

        let thread_handle = thread::Builder::new()
            .name("render-worker".to_string())
            .spawn(move || Self::worker_loop(orchestrator, receiver));

        let thread_handle = match thread_handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "failed to spawn render thread");
                None
            }
        };

        Self {
            sender,
            thread_handle,
            queue,
            stop,
            state,
            pending,
        }
    }

    /// Current orchestrator state.
    pub fn state(&self) -> OrchestratorState {
        self.state.borrow().clone()
    }

    /// True while a batch is queued for the render thread or running on it.
    pub fn is_busy(&self) -> bool {
        self.pending.load(Ordering::SeqCst) || self.state.borrow().is_busy()
    }

    pub fn queue_len(&self) -> usize {
        lock_queue(&self.queue).len()
    }

    /// Labels of the queued jobs, head first.
    pub fn queued_labels(&self) -> Vec<String> {
        lock_queue(&self.queue).labels()
    }

    /// Appends one job to the render queue without starting a batch.
    pub fn enqueue(&self, job: Job) {
        lock_queue(&self.queue).enqueue(job);
    }

    /// Empties the render queue. Returns the number of jobs removed.
    pub fn clear(&self) -> usize {
        let mut queue = lock_queue(&self.queue);
        let removed = queue.len();
        queue.clear();
        removed
    }

    /// Starts a batch over whatever is queued.
    pub fn start(&self) -> Result<()> {
        {
            let queue = lock_queue(&self.queue);
            self.ensure_not_busy()?;
            if !queue.has_items() {
                return Err(CineError::InvalidState("render queue is empty".to_string()));
            }
            self.claim()?;
        }
        self.submit(WorkerMessage::RunBatch)
    }

    /// Replaces the queue with every staged panel job and starts a batch.
    ///
    /// Returns the number of jobs submitted. The board is left untouched when
    /// a batch is already in progress.
    pub fn process(&self, board: &mut PanelBoard) -> Result<usize> {
        let submitted = {
            let mut queue = lock_queue(&self.queue);
            self.ensure_not_busy()?;
            if board.staged_count() == 0 {
                return Err(CineError::InvalidState("no staged jobs to process".to_string()));
            }
            self.claim()?;
            queue.clear();
            board.drain_into(&mut queue)
        };
        self.submit(WorkerMessage::RunBatch)?;
        Ok(submitted)
    }

    /// Re-enters the render loop after a failed batch.
    pub fn resume(&self) -> Result<()> {
        {
            let _queue = lock_queue(&self.queue);
            self.ensure_not_busy()?;
            let state = self.state();
            if !state.is_failed() {
                return Err(CineError::InvalidState(format!(
                    "resume requires a failed batch, current state is {}",
                    state.name()
                )));
            }
            self.claim()?;
        }
        self.submit(WorkerMessage::Resume)
    }

    /// Requests the running batch to stop.
    pub fn stop(&self, mode: StopMode) {
        debug!(?mode, "stop requested");
        self.stop.request(mode);
    }

    /// Aborts any running batch, drops the queue and joins the render thread.
    ///
    /// Clearing the queue also turns a batch command still waiting in the
    /// channel into a no-op.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            self.stop.request(StopMode::Forceful);
            lock_queue(&self.queue).clear();
            self.sender.send(WorkerMessage::Shutdown).ok();
            handle.join().ok();
        }
    }

    fn ensure_not_busy(&self) -> Result<()> {
        if self.pending.load(Ordering::SeqCst) {
            return Err(CineError::InvalidState(
                "a batch is already submitted".to_string(),
            ));
        }
        let state = self.state();
        if state.is_busy() {
            return Err(CineError::InvalidState(format!(
                "a batch is in progress ({})",
                state.name()
            )));
        }
        Ok(())
    }

    /// Marks a batch as submitted and clears stop requests left over from the
    /// previous one. Callers hold the queue lock.
    fn claim(&self) -> Result<()> {
        if self.thread_handle.is_none() {
            return Err(CineError::InvalidState(
                "render thread is not running".to_string(),
            ));
        }
        self.pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| CineError::InvalidState("a batch is already submitted".to_string()))?;
        self.stop.reset();
        Ok(())
    }

    fn submit(&self, message: WorkerMessage) -> Result<()> {
        self.sender.send(message).map_err(|_| {
            self.pending.store(false, Ordering::SeqCst);
            CineError::InvalidState("render thread has exited".to_string())
        })
    }

    fn worker_loop(mut orchestrator: Orchestrator, receiver: Receiver<WorkerMessage>) {
        loop {
            let outcome = match receiver.recv() {
                Ok(WorkerMessage::RunBatch) => orchestrator.run_batch(),
                Ok(WorkerMessage::Resume) => orchestrator.resume(),
                Ok(WorkerMessage::Shutdown) | Err(_) => break,
            };

            match outcome {
                Ok(summary) => debug!(?summary, "batch finished"),
                Err(e) => warn!(error = %e, "batch ended with error"),
            }
        }
        orchestrator.teardown();
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
