//! Pipeline-level error taxonomy.
//!
//! Gate rejections are not errors: they are reported through the gate
//! reports and consumed by the retry loop. Only collaborator failures and
//! the hard-error failure policy surface here.

/// Errors produced by the generation pipeline and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not parse collaborator output: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("quality gates failed for '{concept}' after {attempts} attempt(s)")]
    QualityGateExhausted { concept: String, attempts: u32 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error must abort the whole paper-level run.
    pub fn is_fatal_for_paper(&self) -> bool {
        matches!(self, Self::QualityGateExhausted { .. })
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::Transport("connection reset".to_string());
        assert!(err.to_string().contains("transport error"));
        assert!(err.to_string().contains("connection reset"));

        let err = PipelineError::Config("max_retries must be at least 1".to_string());
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn test_exhausted_error_mentions_concept_and_attempts() {
        let err = PipelineError::QualityGateExhausted {
            concept: "Scaled Dot-Product Attention".to_string(),
            attempts: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("Scaled Dot-Product Attention"));
        assert!(msg.contains('5'));
        assert!(err.is_fatal_for_paper());
    }

    #[test]
    fn test_transport_error_is_not_fatal_for_paper() {
        let err = PipelineError::Transport("timeout".to_string());
        assert!(!err.is_fatal_for_paper());
    }
}
