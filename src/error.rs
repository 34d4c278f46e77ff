use std::path::PathBuf;
use std::process::ExitStatus;

/// Failure of the loudness analysis pass.
#[derive(thiserror::Error, Debug)]
pub enum MeasurementError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("analysis pass exited with {status}:\n{stderr}")]
    Exit { status: ExitStatus, stderr: String },
    #[error("loudnorm JSON block not found in engine output")]
    MissingSummary,
    #[error("could not parse loudnorm JSON: {0}")]
    InvalidSummary(#[from] serde_json::Error),
}

/// Failure of the correction (re-encoding) pass.
#[derive(thiserror::Error, Debug)]
pub enum EncodingError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("correction pass exited with {status}:\n{stderr}")]
    Exit { status: ExitStatus, stderr: String },
}

/// Per-file error. Caught by the batch orchestrator and reported, never fatal.
#[derive(thiserror::Error, Debug)]
pub enum CorrectionError {
    #[error("Measurement failed for {path}: {source}")]
    Measurement {
        path: PathBuf,
        #[source]
        source: MeasurementError,
    },
    #[error("Encoding failed for {path}: {source}")]
    Encoding {
        path: PathBuf,
        #[source]
        source: EncodingError,
    },
    #[error("I/O error while writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal errors: they abort the run before any file is processed.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("'{program}' is not available: {reason}. Please install it and ensure it's on PATH.")]
    Precondition { program: PathBuf, reason: String },
    #[error("{0}")]
    Usage(String),
    #[error("[{group}] {first} and {second} would both be written to {output}")]
    OutputCollision {
        group: String,
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
}
