//! Collaborator contracts consumed by the pipeline.
//!
//! The LLM-backed implementations live in `arxiviz-llm`; scripted ones in
//! [`crate::fakes`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{TtsService, VoiceConfig};
use crate::domain::{Candidate, GeneratedCode, PipelineResult, Plan, Section};

/// Result of analyzing one section for visualization candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionAnalysis {
    pub needs_visualization: bool,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub reasoning: String,
}

/// Finds concepts worth animating in a section.
#[async_trait]
pub trait CandidateExtractor: Send + Sync {
    async fn analyze(
        &self,
        paper_title: &str,
        paper_abstract: &str,
        section: &Section,
    ) -> PipelineResult<SectionAnalysis>;
}

/// Turns a candidate into a storyboard.
#[async_trait]
pub trait PlanBuilder: Send + Sync {
    async fn plan(
        &self,
        candidate: &Candidate,
        section_content: &str,
        paper_context: &str,
    ) -> PipelineResult<Plan>;
}

/// Per-run generation settings handed to the code generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub narration: bool,
    pub tts_service: TtsService,
    pub voice_name: String,
    pub narration_style: String,
    pub target_duration_secs: (u32, u32),
}

impl GenerationOptions {
    /// Options for plain, silent scenes.
    pub fn silent() -> Self {
        Self {
            narration: false,
            ..Self::from(&VoiceConfig::default())
        }
    }
}

impl From<&VoiceConfig> for GenerationOptions {
    fn from(voice: &VoiceConfig) -> Self {
        Self {
            narration: voice.enabled,
            tts_service: voice.tts_service,
            voice_name: voice.voice_name.clone(),
            narration_style: voice.narration_style.clone(),
            target_duration_secs: voice.target_duration_secs,
        }
    }
}

/// Produces animation source for a plan.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// First attempt.
    async fn generate(
        &self,
        plan: &Plan,
        options: &GenerationOptions,
    ) -> PipelineResult<GeneratedCode>;

    /// Later attempts, seeded with the previous code and the gate feedback.
    async fn generate_with_feedback(
        &self,
        plan: &Plan,
        previous_code: &str,
        feedback: &str,
        options: &GenerationOptions,
    ) -> PipelineResult<GeneratedCode>;
}
