//! ArXiviz LLM collaborators
//!
//! Implements the pipeline's collaborator traits on top of the Anthropic
//! Messages API (directly or via the Martian proxy):
//!
//! - [`SectionAnalyzer`]: candidate extraction per section
//! - [`VisualizationPlanner`]: storyboards
//! - [`ManimGenerator`]: scene code, with and without gate feedback
//! - [`LlmNarrationJudge`]: rubric scores for the narration gate

pub mod analyzer;
pub mod client;
pub mod error;
pub mod extract;
pub mod fakes;
pub mod generator;
pub mod judge;
pub mod planner;
pub mod prompts;

pub use analyzer::SectionAnalyzer;
pub use client::{AnthropicClient, LlmService, Provider, ProviderConfig};
pub use error::{LlmError, Result};
pub use extract::{extract_code_block, extract_json_block, parse_json};
pub use generator::ManimGenerator;
pub use judge::LlmNarrationJudge;
pub use planner::VisualizationPlanner;
