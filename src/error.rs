use std::path::PathBuf;

use thiserror::Error;

use crate::core::orchestrator::JobState;

pub type Result<T> = std::result::Result<T, DeckError>;

/// Crate-level error for configuration, storage and surface code.
#[derive(Debug, Error)]
pub enum DeckError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Failure of the remote fetch stage.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid fetch endpoint '{endpoint}': {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote service answered HTTP {status}")]
    Status { status: u16 },

    #[error("connection dropped after {received} bytes: {source}")]
    Interrupted {
        received: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("stream ended after {received} of {expected} bytes")]
    Truncated { received: u64, expected: u64 },

    #[error("payload of {bytes} bytes is below the {min} byte minimum, likely an error page")]
    Implausible { bytes: u64, min: u64 },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the external separation tool.
#[derive(Debug, Error)]
pub enum SeparationError {
    #[error("input file not found: {0}")]
    InputMissing(PathBuf),

    #[error("could not start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("separation tool exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("separation tool succeeded but output directory is missing: {0}")]
    OutputMissing(PathBuf),
}

/// Failure of an external transcode/mix invocation.
///
/// Missing mix inputs and failed conversions are not represented here; they
/// are reported as skips.
#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("a mix needs at least two inputs, got {0}")]
    TooFewInputs(usize),

    #[error("could not start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("audio tool exited with {status}: {stderr}")]
    ToolFailed { status: String, stderr: String },

    #[error("audio tool succeeded but produced no output at {0}")]
    OutputMissing(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A job that may not leave `SUBMITTED`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("source locator is empty")]
    EmptyLocator,

    #[error("label is empty after sanitization")]
    EmptyLabel,
}

/// Reason a job ended in `FAILED`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job rejected: {0}")]
    Guard(#[from] GuardViolation),

    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("separation failed: {0}")]
    Separation(#[from] SeparationError),

    #[error("post-processing failed: {0}")]
    PostProcess(#[from] PostProcessError),

    #[error("cancelled before {0}")]
    Cancelled(JobState),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}
