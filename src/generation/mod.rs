//! Render queue and orchestration.
//!
//! Jobs are staged on panels, drained into a FIFO [`RenderQueue`], and
//! rendered strictly one at a time by the [`Orchestrator`] running on the
//! [`RenderWorker`] thread. Everything observable is reported as a
//! [`RenderEvent`].

pub mod eta;
mod events;
mod orchestrator;
mod panel;
mod progress;
mod queue;
mod stop;
mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use eta::{estimate, EtaEstimate};
pub use events::{EventSink, JobRef, OrchestratorState, RenderEvent};
pub use orchestrator::{BatchSummary, Orchestrator, RenderSettings, DEFAULT_BASE_SEED};
pub use panel::{Panel, PanelBoard};
pub use progress::{StepThrottle, PROGRESS_INCREMENT};
pub use queue::{lock_queue, RenderQueue, SharedQueue};
pub use stop::{CancelToken, StopMode, StopSignal};
pub use worker::RenderWorker;
