//! Section analyzer: the LLM-backed candidate extractor.

use std::sync::Arc;

use arxiviz_core::{CandidateExtractor, PipelineResult, Section, SectionAnalysis};
use async_trait::async_trait;
use tracing::debug;

use crate::client::LlmService;
use crate::extract::parse_json;
use crate::prompts;

/// Asks the model which concepts of a section deserve an animation.
pub struct SectionAnalyzer {
    llm: Arc<dyn LlmService>,
    max_tokens: u32,
}

impl SectionAnalyzer {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            max_tokens: 4096,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl CandidateExtractor for SectionAnalyzer {
    async fn analyze(
        &self,
        paper_title: &str,
        paper_abstract: &str,
        section: &Section,
    ) -> PipelineResult<SectionAnalysis> {
        let prompt = prompts::render(
            prompts::ANALYZER,
            &[
                ("paper_title", paper_title),
                ("paper_abstract", paper_abstract),
                ("section_title", &section.title),
                ("section_content", &section.content),
            ],
        );
        let response = self
            .llm
            .complete(prompts::SYSTEM, &prompt, self.max_tokens)
            .await?;

        let mut analysis: SectionAnalysis = parse_json(&response)?;
        if !analysis.needs_visualization {
            analysis.candidates.clear();
        }
        for candidate in &mut analysis.candidates {
            candidate.section_id = section.id.clone();
        }
        debug!(
            section = %section.id,
            candidates = analysis.candidates.len(),
            "section analyzed"
        );
        Ok(analysis)
    }
}
