//! Error types for the LLM collaborators

use arxiviz_core::PipelineError;
use thiserror::Error;

/// Errors that can occur while talking to the language model
#[derive(Error, Debug)]
pub enum LlmError {
    /// Neither provider key is set
    #[error("no LLM API key configured (set MARTIAN_API_KEY or ANTHROPIC_API_KEY)")]
    MissingApiKey,

    /// Request never produced a response
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider answered with a non-success status
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Response carried no text content
    #[error("response contained no text block")]
    EmptyResponse,

    /// Expected JSON or code could not be found in the response
    #[error("could not extract {what} from response: {excerpt}")]
    Extraction { what: &'static str, excerpt: String },

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Extraction { .. } | LlmError::Json(_) => PipelineError::Parse(err.to_string()),
            other => PipelineError::Transport(other.to_string()),
        }
    }
}

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_maps_to_parse() {
        let err: PipelineError = LlmError::Extraction {
            what: "JSON",
            excerpt: "I cannot help".to_string(),
        }
        .into();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn test_api_failure_maps_to_transport() {
        let err: PipelineError = LlmError::Api {
            status: 529,
            body: "overloaded".to_string(),
        }
        .into();
        assert!(matches!(err, PipelineError::Transport(ref m) if m.contains("529")));
        assert!(!err.is_fatal_for_paper());
    }
}
