//! Render job types.
//!
//! A [`Job`] is one generation request from a panel, carrying the full
//! parameter set. It is created when a panel stages a [`JobRequest`],
//! consumed exactly once by the orchestrator, and dropped once its result
//! has been reported.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::error::{CineError, Result};

/// Inference steps accepted per job.
pub const INFERENCE_STEPS_RANGE: std::ops::RangeInclusive<u32> = 1..=100;
/// Guidance scale accepted per job.
pub const GUIDANCE_SCALE_RANGE: std::ops::RangeInclusive<f32> = 1.0..=20.0;
/// Frame count accepted per job.
pub const NUM_FRAMES_RANGE: std::ops::RangeInclusive<u32> = 1..=100;
/// Videos rendered per job.
pub const VIDEO_COUNT_RANGE: std::ops::RangeInclusive<u32> = 1..=10;
/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;

/// File extension of rendered artifacts.
pub const ARTIFACT_EXTENSION: &str = "mp4";

/// Parameters submitted by a panel, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Project name used as the output file prefix.
    pub project_name: String,

    /// Text prompt for the generation model.
    pub prompt: String,

    /// Number of denoising steps (1-100, default 50).
    #[serde(default = "default_inference_steps")]
    pub inference_steps: u32,

    /// Classifier-free guidance scale (1.0-20.0, default 7.0).
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,

    /// Frames per video (1-100, default 49).
    #[serde(default = "default_num_frames")]
    pub num_frames: u32,

    /// Number of videos rendered for this request (1-10, default 1).
    #[serde(default = "default_video_count")]
    pub video_count: u32,

    /// Base seed. Falls back to the daemon's configured base seed.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_inference_steps() -> u32 {
    50
}

fn default_guidance_scale() -> f32 {
    7.0
}

fn default_num_frames() -> u32 {
    49
}

fn default_video_count() -> u32 {
    1
}

impl JobRequest {
    /// Creates a request with default generation parameters.
    pub fn new(project_name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            prompt: prompt.into(),
            inference_steps: default_inference_steps(),
            guidance_scale: default_guidance_scale(),
            num_frames: default_num_frames(),
            video_count: default_video_count(),
            seed: None,
        }
    }

    /// Sets the number of videos to render.
    pub fn with_video_count(mut self, video_count: u32) -> Self {
        self.video_count = video_count;
        self
    }

    /// Sets the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the request.
    ///
    /// Rejected requests never enter the queue.
    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            return Err(CineError::empty_field("project name"));
        }
        if self.prompt.trim().is_empty() {
            return Err(CineError::empty_field("prompt"));
        }
        if self.prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(CineError::InputValidation(format!(
                "Prompt too long: {} characters (max {})",
                self.prompt.chars().count(),
                MAX_PROMPT_CHARS
            )));
        }
        if self
            .project_name
            .chars()
            .any(|c| std::path::is_separator(c) || c.is_control())
        {
            return Err(CineError::InputValidation(format!(
                "Project name {:?} must not contain path separators",
                self.project_name
            )));
        }
        if !INFERENCE_STEPS_RANGE.contains(&self.inference_steps) {
            return Err(CineError::out_of_range("inference steps", self.inference_steps, "1-100"));
        }
        if !GUIDANCE_SCALE_RANGE.contains(&self.guidance_scale) {
            return Err(CineError::out_of_range("guidance scale", self.guidance_scale, "1.0-20.0"));
        }
        if !NUM_FRAMES_RANGE.contains(&self.num_frames) {
            return Err(CineError::out_of_range("frame count", self.num_frames, "1-100"));
        }
        if !VIDEO_COUNT_RANGE.contains(&self.video_count) {
            return Err(CineError::out_of_range("video count", self.video_count, "1-10"));
        }
        Ok(())
    }
}

/// Status of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Staged on its panel, not yet moved to the render queue.
    #[default]
    Staged,
    /// Waiting in the render queue.
    Queued,
    /// Currently rendering.
    Rendering,
    /// All videos rendered.
    Complete,
    /// The pipeline failed.
    Failed,
    /// Aborted by a forceful stop.
    Cancelled,
}

impl JobStatus {
    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// A validated render job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Panel (input group) the job was submitted from.
    pub panel_id: u32,

    /// Project name, non-empty.
    pub project_name: String,

    /// Prompt text, non-empty.
    pub prompt: String,

    pub inference_steps: u32,

    pub guidance_scale: f32,

    pub num_frames: u32,

    /// Number of videos to render, at least 1.
    pub video_count: u32,

    /// Per-panel sequence number, starting at 1.
    pub sequence_number: u32,

    /// Explicit base seed from the request.
    pub seed: Option<u64>,

    /// Current job state.
    pub status: JobStatus,

    /// Videos rendered so far.
    pub completed_videos: u32,

    /// When the job was staged.
    #[serde(with = "system_time_serde")]
    pub created_at: SystemTime,

    /// When rendering started.
    #[serde(with = "option_system_time_serde")]
    pub started_at: Option<SystemTime>,
}

impl Job {
    /// Validates a request and turns it into a job.
    pub fn new(panel_id: u32, sequence_number: u32, request: JobRequest) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            panel_id,
            project_name: request.project_name.trim().to_string(),
            prompt: request.prompt,
            inference_steps: request.inference_steps,
            guidance_scale: request.guidance_scale,
            num_frames: request.num_frames,
            video_count: request.video_count,
            sequence_number,
            seed: request.seed,
            status: JobStatus::Staged,
            completed_videos: 0,
            created_at: SystemTime::now(),
            started_at: None,
        })
    }

    /// Short label used in logs and queue listings, e.g. `harbor_2`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.project_name, self.sequence_number)
    }

    /// Output file name for the 1-based video `index`.
    ///
    /// Format: `{project_name}_{sequence_number}_video_{index}.mp4`
    pub fn output_file_name(&self, index: u32) -> String {
        format!(
            "{}_{}_video_{}.{}",
            self.project_name, self.sequence_number, index, ARTIFACT_EXTENSION
        )
    }

    /// Temporary file name the pipeline writes before post-processing.
    pub fn temp_file_name(&self, index: u32) -> String {
        format!("temp_{}", self.output_file_name(index))
    }

    /// Seed for the 0-based repetition `repetition`.
    ///
    /// Equal base seeds always yield the same seed sequence.
    pub fn seed_for(&self, repetition: u32, default_base: u64) -> u64 {
        self.seed
            .unwrap_or(default_base)
            .wrapping_add(u64::from(repetition))
    }

    /// Job progress as a whole percentage of rendered videos.
    pub fn progress_percent(&self) -> u8 {
        if self.video_count == 0 {
            return 0;
        }
        ((self.completed_videos.min(self.video_count) * 100) / self.video_count) as u8
    }

    /// Marks the job as queued.
    pub fn set_queued(&mut self) {
        self.status = JobStatus::Queued;
    }

    /// Marks the job as rendering.
    pub fn set_rendering(&mut self) {
        self.status = JobStatus::Rendering;
        self.completed_videos = 0;
        self.started_at = Some(SystemTime::now());
    }

    /// Records one finished video.
    pub fn record_video(&mut self) {
        self.completed_videos = (self.completed_videos + 1).min(self.video_count);
    }

    pub fn set_complete(&mut self) {
        self.status = JobStatus::Complete;
    }

    pub fn set_failed(&mut self) {
        self.status = JobStatus::Failed;
    }

    pub fn set_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
    }
}

/// Custom serde implementation for SystemTime.
pub(crate) mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

/// Custom serde implementation for Option<SystemTime>.
mod option_system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => {
                let duration = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
                Some(duration.as_millis() as u64).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<u64>::deserialize(deserializer)?;
        Ok(opt.map(|millis| UNIX_EPOCH + Duration::from_millis(millis)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn request() -> JobRequest {
        JobRequest::new("harbor", "a lighthouse at dusk, slow dolly in")
    }

    #[test]
    fn job_status_terminal() {
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Staged.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Rendering.is_terminal());
    }

    #[test]
    fn request_defaults_match_panel_widgets() {
        let req: JobRequest =
            serde_json::from_str(r#"{"project_name":"p","prompt":"x"}"#).unwrap();
        assert_eq!(req.inference_steps, 50);
        assert_eq!(req.guidance_scale, 7.0);
        assert_eq!(req.num_frames, 49);
        assert_eq!(req.video_count, 1);
        assert!(req.seed.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_project_or_prompt_rejected() {
        let mut req = request();
        req.project_name = "  ".to_string();
        assert_eq!(req.validate().unwrap_err().code(), ErrorCode::InvalidInput);

        let mut req = request();
        req.prompt = String::new();
        assert!(Job::new(0, 1, req).is_err());
    }

    #[test]
    fn out_of_range_parameters_rejected() {
        assert!(request().with_video_count(0).validate().is_err());
        assert!(request().with_video_count(11).validate().is_err());

        let mut req = request();
        req.inference_steps = 0;
        assert!(req.validate().is_err());

        let mut req = request();
        req.guidance_scale = 20.5;
        assert!(req.validate().is_err());

        let mut req = request();
        req.num_frames = 101;
        assert!(req.validate().is_err());
    }

    #[test]
    fn project_name_with_separator_rejected() {
        let mut req = request();
        req.project_name = "../escape".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn output_naming_convention() {
        let job = Job::new(2, 7, request()).unwrap();
        assert_eq!(job.output_file_name(1), "harbor_7_video_1.mp4");
        assert_eq!(job.temp_file_name(3), "temp_harbor_7_video_3.mp4");
        assert_eq!(job.label(), "harbor_7");
    }

    #[test]
    fn seeds_are_base_plus_repetition() {
        let job = Job::new(0, 1, request().with_seed(1000)).unwrap();
        assert_eq!(job.seed_for(0, 42), 1000);
        assert_eq!(job.seed_for(2, 42), 1002);

        let job = Job::new(0, 1, request()).unwrap();
        assert_eq!(job.seed_for(0, 42), 42);
        assert_eq!(job.seed_for(1, 42), 43);
    }

    #[test]
    fn progress_tracks_completed_videos() {
        let mut job = Job::new(0, 1, request().with_video_count(4)).unwrap();
        job.set_rendering();
        assert_eq!(job.progress_percent(), 0);
        job.record_video();
        assert_eq!(job.progress_percent(), 25);
        for _ in 0..10 {
            job.record_video();
        }
        assert_eq!(job.completed_videos, 4);
        assert_eq!(job.progress_percent(), 100);
    }
}
