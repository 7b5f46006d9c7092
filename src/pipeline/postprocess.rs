//! Post-processing of raw pipeline artifacts.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::PipelineError;

/// Frame rate of re-encoded output.
pub const REENCODE_FRAME_RATE: u32 = 24;

/// Turns a raw artifact into the final output file.
pub trait PostProcessor: Send {
    /// Consumes `raw` and writes `output`. `raw` must not exist afterwards
    /// unless it is the same path as `output`.
    fn process(&self, raw: &Path, output: &Path) -> Result<(), PipelineError>;
}

/// Moves the raw artifact to its final name unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl PostProcessor for PassThrough {
    fn process(&self, raw: &Path, output: &Path) -> Result<(), PipelineError> {
        if raw != output {
            fs::rename(raw, output)?;
        }
        Ok(())
    }
}

/// Re-encodes the raw artifact to H.264 / yuv420p with ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegReencoder {
    binary: PathBuf,
}

impl Default for FfmpegReencoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegReencoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, raw: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-y")
            .arg("-i")
            .arg(raw)
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-r"])
            .arg(REENCODE_FRAME_RATE.to_string())
            .arg(output);
        command
    }
}

impl PostProcessor for FfmpegReencoder {
    fn process(&self, raw: &Path, output: &Path) -> Result<(), PipelineError> {
        debug!(raw = %raw.display(), output = %output.display(), "re-encoding");

        let result = self.command(raw, output).output().map_err(|e| {
            PipelineError::PostProcess(format!(
                "Failed to run {}: {}",
                self.binary.display(),
                e
            ))
        })?;

        if !result.status.success() {
            return Err(PipelineError::PostProcess(format!(
                "ffmpeg exited with {:?}: {}",
                result.status.code(),
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        fs::remove_file(raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_renames() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("temp_harbor_1_video_1.mp4");
        let output = dir.path().join("harbor_1_video_1.mp4");
        fs::write(&raw, b"frames").unwrap();

        PassThrough.process(&raw, &output).unwrap();
        assert!(!raw.exists());
        assert_eq!(fs::read(&output).unwrap(), b"frames");
    }

    #[test]
    fn pass_through_same_path_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harbor_1_video_1.mp4");
        fs::write(&path, b"frames").unwrap();
        PassThrough.process(&path, &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn pass_through_missing_raw_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PassThrough
            .process(&dir.path().join("missing.mp4"), &dir.path().join("out.mp4"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn reencode_command_line() {
        let encoder = FfmpegReencoder::default();
        let command = encoder.command(Path::new("in.mp4"), Path::new("out.mp4"));
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "-y", "-i", "in.mp4", "-c:v", "libx264", "-pix_fmt", "yuv420p", "-r", "24",
                "out.mp4"
            ]
        );
        assert_eq!(command.get_program(), "ffmpeg");
    }

    #[test]
    fn missing_binary_is_post_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.mp4");
        fs::write(&raw, b"frames").unwrap();

        let encoder = FfmpegReencoder::new(dir.path().join("no-such-ffmpeg"));
        let err = encoder.process(&raw, &dir.path().join("out.mp4")).unwrap_err();
        assert!(matches!(err, PipelineError::PostProcess(_)));
        assert!(raw.exists());
    }
}
