//! Daemon configuration module.
//!
//! Defaults, overridden by `CINEBOARD_*` environment variables, overridden by
//! command-line flags. Malformed values are startup errors rather than being
//! silently replaced by defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CineError, Result};
use crate::generation::RenderSettings;

/// Default generation service endpoint.
pub const DEFAULT_PIPELINE_URL: &str = "http://127.0.0.1:5000";

/// Default accelerator core count used for the active core estimate.
pub const DEFAULT_DEVICE_CORES: u32 = 16384;

/// Allowed sampling interval in milliseconds.
pub const SAMPLE_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 50..=60_000;

/// Allowed telemetry history length.
pub const HISTORY_CAPACITY_RANGE: std::ops::RangeInclusive<usize> = 1..=3600;

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory for rendered videos.
    /// If None, uses the platform-specific default cache location.
    pub output_dir: Option<PathBuf>,

    /// Base URL of the generation service.
    pub pipeline_url: String,

    /// Seed used for jobs that do not carry their own.
    pub base_seed: u64,

    /// Telemetry sampling interval in milliseconds.
    pub sample_interval_ms: u64,

    /// Samples kept per telemetry series.
    pub history_capacity: usize,

    /// Total accelerator cores, for the active core estimate.
    pub device_cores: u32,

    /// NVML index of the sampled accelerator.
    pub device_index: u32,

    /// Re-encode raw videos with ffmpeg instead of moving them as-is.
    pub reencode: bool,

    /// ffmpeg executable used for re-encoding.
    pub ffmpeg_binary: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            pipeline_url: DEFAULT_PIPELINE_URL.to_string(),
            base_seed: 42,
            sample_interval_ms: 1000,
            history_capacity: 60,
            device_cores: DEFAULT_DEVICE_CORES,
            device_index: 0,
            reencode: false,
            ffmpeg_binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl DaemonConfig {
    /// Creates a DaemonConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a DaemonConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `CINEBOARD_OUTPUT_DIR` - Directory for rendered videos
    /// - `CINEBOARD_PIPELINE_URL` - Generation service base URL
    /// - `CINEBOARD_BASE_SEED` - Default base seed
    /// - `CINEBOARD_SAMPLE_INTERVAL_MS` - Telemetry sampling interval
    /// - `CINEBOARD_HISTORY_CAPACITY` - Samples kept per telemetry series
    /// - `CINEBOARD_DEVICE_CORES` - Accelerator core count
    /// - `CINEBOARD_DEVICE_INDEX` - NVML device index
    /// - `CINEBOARD_REENCODE` - Re-encode with ffmpeg (true/false)
    /// - `CINEBOARD_FFMPEG` - ffmpeg executable
    ///
    /// Unset variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("CINEBOARD_OUTPUT_DIR") {
            config.output_dir = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("CINEBOARD_PIPELINE_URL") {
            config.pipeline_url = url;
        }
        if let Some(value) = lookup("CINEBOARD_BASE_SEED") {
            config.base_seed = parse_var("CINEBOARD_BASE_SEED", &value)?;
        }
        if let Some(value) = lookup("CINEBOARD_SAMPLE_INTERVAL_MS") {
            config.sample_interval_ms = parse_var("CINEBOARD_SAMPLE_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("CINEBOARD_HISTORY_CAPACITY") {
            config.history_capacity = parse_var("CINEBOARD_HISTORY_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("CINEBOARD_DEVICE_CORES") {
            config.device_cores = parse_var("CINEBOARD_DEVICE_CORES", &value)?;
        }
        if let Some(value) = lookup("CINEBOARD_DEVICE_INDEX") {
            config.device_index = parse_var("CINEBOARD_DEVICE_INDEX", &value)?;
        }
        if let Some(value) = lookup("CINEBOARD_REENCODE") {
            config.reencode = parse_bool("CINEBOARD_REENCODE", &value)?;
        }
        if let Some(path) = lookup("CINEBOARD_FFMPEG") {
            config.ffmpeg_binary = PathBuf::from(path);
        }

        Ok(config)
    }

    /// Returns the effective output directory, using platform defaults if not specified.
    pub fn effective_output_dir(&self) -> PathBuf {
        if let Some(ref path) = self.output_dir {
            path.clone()
        } else {
            default_output_dir()
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Output directory and base seed handed to the orchestrator.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings::new(self.effective_output_dir()).with_base_seed(self.base_seed)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline_url.trim().is_empty() {
            return Err(CineError::Config("pipeline URL cannot be empty".to_string()));
        }
        if !(self.pipeline_url.starts_with("http://") || self.pipeline_url.starts_with("https://"))
        {
            return Err(CineError::Config(format!(
                "pipeline URL must start with http:// or https://, got {:?}",
                self.pipeline_url
            )));
        }
        if !SAMPLE_INTERVAL_RANGE_MS.contains(&self.sample_interval_ms) {
            return Err(CineError::Config(format!(
                "sample interval {} ms is outside 50-60000 ms",
                self.sample_interval_ms
            )));
        }
        if !HISTORY_CAPACITY_RANGE.contains(&self.history_capacity) {
            return Err(CineError::Config(format!(
                "history capacity {} is outside 1-3600",
                self.history_capacity
            )));
        }
        if self.device_cores == 0 {
            return Err(CineError::Config("device cores must be > 0".to_string()));
        }
        if self.ffmpeg_binary.as_os_str().is_empty() {
            return Err(CineError::Config("ffmpeg binary cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CineError::Config(format!("{}={:?}: {}", key, value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CineError::Config(format!(
            "{}={:?}: expected true or false",
            key, value
        ))),
    }
}

/// Returns the platform-specific default output path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Caches/cineboard/renders
/// - Linux: ~/.cache/cineboard/renders
/// - Windows: C:\Users\<user>\AppData\Local\cineboard\cache\renders
fn default_output_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "cineboard") {
        proj_dirs.cache_dir().join("renders")
    } else {
        PathBuf::from("./renders")
    }
}
