//! Boundary to the external video generation runtime.
//!
//! The orchestrator owns exactly one [`PipelineAdapter`] for its whole
//! lifetime and drives its load/generate/unload lifecycle explicitly.

mod http;
mod postprocess;
mod setup;

use std::path::PathBuf;

use thiserror::Error;

use crate::generation::CancelToken;

pub use http::HttpPipeline;
pub use postprocess::{FfmpegReencoder, PassThrough, PostProcessor, REENCODE_FRAME_RATE};
pub use setup::{DependencySetup, NoSetup, Prerequisites};

/// Output width in pixels.
pub const VIDEO_WIDTH: u32 = 720;

/// Output height in pixels.
pub const VIDEO_HEIGHT: u32 = 480;

/// Frame rate of the raw export.
pub const EXPORT_FPS: u32 = 8;

/// Errors raised at the adapter boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline is not loaded")]
    NotLoaded,

    #[error("failed to load pipeline: {0}")]
    Load(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("post-processing failed: {0}")]
    PostProcess(String),

    #[error("generation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters for rendering one video.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    pub inference_steps: u32,
    pub guidance_scale: f32,
    pub num_frames: u32,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Where the raw artifact must be written.
    pub output_path: PathBuf,
    pub cancel: CancelToken,
}

/// A generation runtime that turns one request into one video file.
pub trait PipelineAdapter: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Initializes the runtime. Called once before the first render of a batch.
    fn load(&mut self) -> Result<(), PipelineError>;

    fn is_loaded(&self) -> bool;

    /// Renders one video to `request.output_path` and returns the path written.
    ///
    /// `on_progress` receives `(step, total_steps)`; steps are monotonic within
    /// one call. Implementations should poll `request.cancel` and return
    /// [`PipelineError::Cancelled`] when it fires.
    fn generate(
        &mut self,
        request: &VideoRequest,
        on_progress: &mut dyn FnMut(u32, u32),
    ) -> Result<PathBuf, PipelineError>;

    /// Releases the runtime.
    fn unload(&mut self);
}
