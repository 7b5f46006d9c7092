//! Command-line argument parser.
//!
//! Without `--daemon` the binary renders a single job described by the flags
//! and exits, which is handy for checking a generation service by hand.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DaemonConfig;
use crate::types::JobRequest;

/// cineboard-daemon: storyboard video rendering daemon
#[derive(Parser, Debug)]
#[command(name = "cineboard-daemon")]
#[command(about = "Storyboard video rendering daemon with resource telemetry")]
#[command(version)]
pub struct Cli {
    /// Project name used as the output file prefix
    #[arg(long)]
    pub project: Option<String>,

    /// Text prompt describing the video to generate
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Number of denoising steps
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub steps: u32,

    /// Classifier-free guidance scale
    #[arg(long, default_value = "7.0")]
    pub guidance: f32,

    /// Frames per video
    #[arg(long, default_value = "49", value_parser = clap::value_parser!(u32).range(1..=100))]
    pub frames: u32,

    /// Number of videos to render
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..=10))]
    pub videos: u32,

    /// Base seed for reproducible generation
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Directory for rendered videos
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Base URL of the generation service
    #[arg(long)]
    pub pipeline_url: Option<String>,

    /// Telemetry sampling interval in milliseconds
    #[arg(long)]
    pub sample_interval_ms: Option<u64>,

    /// Re-encode rendered videos with ffmpeg
    #[arg(long)]
    pub reencode: bool,

    /// Run in daemon mode (JSON-RPC over stdio)
    #[arg(long)]
    pub daemon: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Returns true if running in CLI mode (not daemon mode).
    pub fn is_cli_mode(&self) -> bool {
        !self.daemon && self.prompt.is_some()
    }

    /// Returns true if running in daemon mode.
    pub fn is_daemon_mode(&self) -> bool {
        self.daemon
    }

    /// Layers the flags that were given over `config`.
    pub fn apply_to(&self, config: &mut DaemonConfig) {
        if let Some(ref dir) = self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(ref url) = self.pipeline_url {
            config.pipeline_url = url.clone();
        }
        if let Some(interval) = self.sample_interval_ms {
            config.sample_interval_ms = interval;
        }
        if self.reencode {
            config.reencode = true;
        }
    }

    /// Builds the single job request for CLI mode.
    ///
    /// The project name defaults to "cli". Validation happens when the job is
    /// staged, not here.
    pub fn job_request(&self) -> Option<JobRequest> {
        let prompt = self.prompt.clone()?;
        let project = self.project.clone().unwrap_or_else(|| "cli".to_string());

        let mut request = JobRequest::new(project, prompt).with_video_count(self.videos);
        request.inference_steps = self.steps;
        request.guidance_scale = self.guidance;
        request.num_frames = self.frames;
        request.seed = self.seed;
        Some(request)
    }
}
