//! Error types for stepgen generation runs.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by the external generation collaborators
/// (conditioning provider, sampler, decoder).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Conditioning failed: {0}")]
    Conditioning(String),

    #[error("Sampling failed: {0}")]
    Sampling(String),

    #[error("Decoding failed: {0}")]
    Decoding(String),
}

/// Watermark encoder failures. Fatal to a single image write only.
#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Image {width}x{height} cannot carry a {bits}-bit signature")]
    ImageTooSmall { width: u32, height: u32, bits: usize },

    #[error("Watermark signature cannot be empty")]
    EmptySignature,
}

/// Reasons a single image is dropped from a run.
#[derive(Debug, Error)]
pub enum ImageWriteError {
    #[error("Malformed decoded image: {0}")]
    Malformed(String),

    #[error("Watermark failed: {0}")]
    Watermark(#[from] WatermarkError),

    #[error("Encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Grid assembly failed: {0}")]
    Grid(String),
}

/// Errors surfaced to whoever invoked a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Image {ordinal} failed: {reason}")]
    ImageFailed { ordinal: usize, reason: ImageWriteError },

    #[error("Contract violation: {0}")]
    Contract(String),
}

impl RunError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<config::ConfigError> for RunError {
    fn from(err: config::ConfigError) -> Self {
        RunError::Config(err.to_string())
    }
}
