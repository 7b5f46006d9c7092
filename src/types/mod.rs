//! Core types for the cineboard daemon.
//!
//! - [`Job`] / [`JobRequest`]: one generation request with its parameter set
//! - [`GenerationResult`]: outcome of one rendered video
//! - [`TelemetrySample`]: one resource telemetry tick

mod job;
mod result;
mod telemetry;

pub use job::{
    Job, JobRequest, JobStatus, ARTIFACT_EXTENSION, GUIDANCE_SCALE_RANGE, INFERENCE_STEPS_RANGE,
    MAX_PROMPT_CHARS, NUM_FRAMES_RANGE, VIDEO_COUNT_RANGE,
};
pub use result::{GenerationResult, ResultStatus};
pub use telemetry::{DeviceReading, TelemetrySample};
