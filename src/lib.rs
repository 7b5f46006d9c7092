//! cineboard-daemon: render queue daemon for text-to-video generation.
//!
//! Storyboard panels stage generation jobs; a strictly sequential render
//! loop drains them through one external video pipeline while a periodic
//! sampler records CPU and accelerator load.
//!
//! # Modules
//!
//! - [`types`]: Core data types (Job, JobRequest, GenerationResult, TelemetrySample)
//! - [`generation`]: Render queue, orchestrator, progress/ETA and the render worker
//! - [`pipeline`]: Pipeline adapter boundary, post-processing and dependency setup
//! - [`telemetry`]: Rolling telemetry history and the sampler task
//! - [`rpc`]: JSON-RPC 2.0 surface over stdio
//! - [`config`]: Runtime configuration (DaemonConfig)
//! - [`error`]: Error types and codes (CineError, ErrorCode)
//!
//! # Example
//!
//! ```rust,ignore
//! use cineboard_daemon::{
//!     generation::{Orchestrator, PanelBoard, RenderWorker},
//!     pipeline::HttpPipeline,
//!     types::JobRequest,
//!     DaemonConfig,
//! };
//!
//! let config = DaemonConfig::from_env()?;
//! let (orchestrator, events) = Orchestrator::new(
//!     Box::new(HttpPipeline::new(config.pipeline_url.clone())),
//!     config.render_settings(),
//! );
//! let worker = RenderWorker::spawn(orchestrator);
//!
//! let mut board = PanelBoard::new();
//! board.stage(1, JobRequest::new("harbor", "fog over the pier").with_video_count(2))?;
//! worker.process(&mut board)?;
//!
//! for event in events {
//!     println!("{:?}", event);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod rpc;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use config::DaemonConfig;
pub use error::{CineError, ErrorCode, Result};
pub use generation::{Orchestrator, OrchestratorState, RenderEvent, RenderQueue, RenderWorker};
pub use types::{GenerationResult, Job, JobRequest, JobStatus, TelemetrySample};
