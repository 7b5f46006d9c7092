//! Error types for the cineboard daemon.
//!
//! Defines the error taxonomy used throughout the daemon: input validation at
//! the submission boundary, dependency setup, pipeline execution, telemetry
//! queries and startup configuration.

use std::fmt;

use thiserror::Error;

/// Stable error codes surfaced to clients in error responses and
/// `error` notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A job request was rejected before it reached the queue.
    /// Trigger: empty project name or prompt, parameter out of range.
    InvalidInput,

    /// Prerequisite setup failed; the whole batch was aborted.
    /// Trigger: output directory not writable, service unreachable, no ffmpeg.
    DependencySetupFailed,

    /// The generation pipeline failed while rendering a job.
    /// Trigger: service error, OOM on the device, post-processing failure.
    PipelineFailed,

    /// A device telemetry query failed. Never fatal.
    TelemetryQueryFailed,

    /// Operation not allowed in the current orchestrator state.
    InvalidState,

    /// Startup configuration could not be parsed or is out of range.
    InvalidConfig,

    /// Filesystem error outside the pipeline.
    Io,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::DependencySetupFailed => "DEPENDENCY_SETUP_FAILED",
            ErrorCode::PipelineFailed => "PIPELINE_FAILED",
            ErrorCode::TelemetryQueryFailed => "TELEMETRY_QUERY_FAILED",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::Io => "IO_ERROR",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Job request failed validation and was not queued",
            ErrorCode::DependencySetupFailed => "Prerequisite setup failed; the batch was aborted",
            ErrorCode::PipelineFailed => "The generation pipeline failed while rendering a job",
            ErrorCode::TelemetryQueryFailed => "A device telemetry query failed",
            ErrorCode::InvalidState => "Operation not allowed in the current render state",
            ErrorCode::InvalidConfig => "Startup configuration is malformed",
            ErrorCode::Io => "Filesystem operation failed",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => {
                "Provide a non-empty project name and prompt, and keep steps, guidance, \
                 frames and video count within their allowed ranges"
            }
            ErrorCode::DependencySetupFailed => {
                "Check that the output directory is writable and the generation service is \
                 running, then submit the batch again"
            }
            ErrorCode::PipelineFailed => {
                "Remaining jobs are still queued. Fix the cause (memory, service logs) and \
                 call resume, or clear the queue"
            }
            ErrorCode::TelemetryQueryFailed => {
                "Sampling continues with zeroed readings. Check the NVIDIA driver installation"
            }
            ErrorCode::InvalidState => {
                "Query status first; resume is only accepted after a failed batch"
            }
            ErrorCode::InvalidConfig => {
                "Fix the CINEBOARD_* environment variables or command-line flags and restart"
            }
            ErrorCode::Io => "Check permissions and free disk space",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for daemon operations.
#[derive(Debug, Error)]
pub enum CineError {
    /// Rejected at the submission boundary; the job never enters the queue.
    #[error("Invalid job input: {0}")]
    InputValidation(String),

    /// Prerequisite setup failed. Fatal to the whole batch, never retried.
    #[error("Dependency setup failed: {0}")]
    DependencySetup(String),

    /// Pipeline failure, reported with the job that was running.
    #[error("Pipeline failed for {project_name} #{sequence_number}: {message}")]
    PipelineExecution {
        project_name: String,
        sequence_number: u32,
        message: String,
    },

    #[error("Telemetry query failed: {0}")]
    TelemetryQuery(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CineError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CineError::InputValidation(_) => ErrorCode::InvalidInput,
            CineError::DependencySetup(_) => ErrorCode::DependencySetupFailed,
            CineError::PipelineExecution { .. } => ErrorCode::PipelineFailed,
            CineError::TelemetryQuery(_) => ErrorCode::TelemetryQueryFailed,
            CineError::InvalidState(_) => ErrorCode::InvalidState,
            CineError::Config(_) => ErrorCode::InvalidConfig,
            CineError::Io(_) => ErrorCode::Io,
        }
    }

    /// Formats the error together with its recovery hint for display to users.
    pub fn with_hint(&self) -> String {
        format!("[{}] {}. Recovery: {}", self.code(), self, self.code().recovery_hint())
    }

    /// Creates an INVALID_INPUT error for an empty required field.
    pub fn empty_field(field: &str) -> Self {
        CineError::InputValidation(format!("{} cannot be empty", field))
    }

    /// Creates an INVALID_INPUT error for a numeric parameter out of range.
    pub fn out_of_range(field: &str, value: impl fmt::Display, range: &str) -> Self {
        CineError::InputValidation(format!(
            "{} {} is outside the allowed range {}",
            field, value, range
        ))
    }
}

/// Result type alias using CineError.
pub type Result<T> = std::result::Result<T, CineError>;
