//! Outcome of rendering one video.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Whether a video render succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "message")]
pub enum ResultStatus {
    Success,
    Failure(String),
}

/// Result of rendering a single video of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Final artifact path (after post-processing).
    pub path: PathBuf,

    /// Wall-clock seconds spent on this video, including post-processing.
    pub elapsed_sec: f64,

    /// Seed the pipeline was invoked with.
    pub seed: u64,

    #[serde(flatten)]
    pub status: ResultStatus,
}

impl GenerationResult {
    /// Creates a successful result.
    pub fn success(path: PathBuf, elapsed: Duration, seed: u64) -> Self {
        Self {
            path,
            elapsed_sec: elapsed.as_secs_f64(),
            seed,
            status: ResultStatus::Success,
        }
    }

    /// Creates a failed result for the artifact that would have been written.
    pub fn failure(path: PathBuf, elapsed: Duration, seed: u64, message: impl Into<String>) -> Self {
        Self {
            path,
            elapsed_sec: elapsed.as_secs_f64(),
            seed,
            status: ResultStatus::Failure(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_sec.max(0.0))
    }
}
