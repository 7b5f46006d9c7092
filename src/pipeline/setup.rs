//! Prerequisite checks run before a batch starts rendering.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{CineError, Result};

const WRITE_CHECK_FILE: &str = ".cineboard-write-check";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking setup phase of a batch.
///
/// `on_progress` receives `(done, total)` after each step. Any error aborts
/// the whole batch.
pub trait DependencySetup: Send {
    fn run(&mut self, on_progress: &mut dyn FnMut(u32, u32)) -> Result<()>;
}

/// Setup that has nothing to check.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSetup;

impl DependencySetup for NoSetup {
    fn run(&mut self, on_progress: &mut dyn FnMut(u32, u32)) -> Result<()> {
        on_progress(1, 1);
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Check {
    OutputDir(PathBuf),
    Service(String),
    Ffmpeg(PathBuf),
}

/// Default prerequisites: writable output directory, reachable service,
/// and a working ffmpeg when re-encoding.
#[derive(Debug, Clone)]
pub struct Prerequisites {
    checks: Vec<Check>,
}

impl Prerequisites {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            checks: vec![Check::OutputDir(output_dir.into())],
        }
    }

    /// Also require `GET {base_url}/health` to succeed.
    pub fn with_service(mut self, base_url: &str) -> Self {
        self.checks.push(Check::Service(format!(
            "{}/health",
            base_url.trim_end_matches('/')
        )));
        self
    }

    /// Also require `{binary} -version` to succeed.
    pub fn with_ffmpeg(mut self, binary: impl Into<PathBuf>) -> Self {
        self.checks.push(Check::Ffmpeg(binary.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl DependencySetup for Prerequisites {
    fn run(&mut self, on_progress: &mut dyn FnMut(u32, u32)) -> Result<()> {
        let total = self.checks.len() as u32;
        for (done, check) in self.checks.iter().enumerate() {
            debug!(check = ?check, "checking prerequisite");
            match check {
                Check::OutputDir(dir) => ensure_writable(dir)?,
                Check::Service(url) => ensure_reachable(url)?,
                Check::Ffmpeg(binary) => ensure_ffmpeg(binary)?,
            }
            on_progress(done as u32 + 1, total);
        }
        info!(checks = total, "prerequisites satisfied");
        Ok(())
    }
}

fn ensure_writable(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        CineError::DependencySetup(format!(
            "Failed to create output directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let marker = dir.join(WRITE_CHECK_FILE);
    fs::write(&marker, b"").map_err(|e| {
        CineError::DependencySetup(format!(
            "Output directory {} is not writable: {}",
            dir.display(),
            e
        ))
    })?;
    fs::remove_file(&marker).ok();
    Ok(())
}

fn ensure_reachable(url: &str) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HEALTH_TIMEOUT)
        .build()
        .map_err(|e| {
            CineError::DependencySetup(format!("Failed to create HTTP client: {}", e))
        })?;

    let response = client.get(url).send().map_err(|e| {
        CineError::DependencySetup(format!("Generation service unreachable at {}: {}", url, e))
    })?;

    if !response.status().is_success() {
        return Err(CineError::DependencySetup(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }
    Ok(())
}

fn ensure_ffmpeg(binary: &Path) -> Result<()> {
    let output = Command::new(binary).arg("-version").output().map_err(|e| {
        CineError::DependencySetup(format!("Failed to run {}: {}", binary.display(), e))
    })?;

    if !output.status.success() {
        return Err(CineError::DependencySetup(format!(
            "{} -version exited with {:?}",
            binary.display(),
            output.status.code()
        )));
    }
    Ok(())
}
