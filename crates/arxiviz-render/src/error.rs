//! Error types for rendering and video storage

use arxiviz_core::PipelineError;
use thiserror::Error;

/// Errors that can occur while rendering or storing videos
#[derive(Error, Debug)]
pub enum RenderError {
    /// Renderer exceeded its wall-clock budget and was killed
    #[error("render of {scene} timed out after {secs} seconds")]
    Timeout { scene: String, secs: u64 },

    /// Renderer executable could not be started
    #[error("could not start renderer '{executable}': {reason}")]
    Spawn { executable: String, reason: String },

    /// Renderer exited unsuccessfully
    #[error("render failed with exit code {exit_code}: {output}")]
    Failed { exit_code: i32, output: String },

    /// Renderer succeeded but produced no video
    #[error("no video produced for {0}")]
    NoOutput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Video storage or status persistence failed
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<PipelineError> for RenderError {
    fn from(err: PipelineError) -> Self {
        RenderError::Storage(err.to_string())
    }
}

/// Result type for render operations
pub type Result<T> = std::result::Result<T, RenderError>;
