//! Visualization planner: the LLM-backed plan builder.

use std::sync::Arc;

use arxiviz_core::{Candidate, PipelineError, PipelineResult, Plan, PlanBuilder, Scene, VisualizationKind};
use async_trait::async_trait;
use serde::Deserialize;

use crate::client::LlmService;
use crate::extract::parse_json;
use crate::prompts;

/// Storyboard as the model returns it; missing fields fall back to the candidate.
#[derive(Debug, Deserialize)]
struct PlanDraft {
    #[serde(default)]
    concept_name: Option<String>,
    #[serde(default)]
    visualization_type: Option<VisualizationKind>,
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default)]
    scenes: Vec<Scene>,
    #[serde(default)]
    narration_points: Vec<String>,
}

impl PlanDraft {
    fn into_plan(self, candidate: &Candidate) -> PipelineResult<Plan> {
        if self.scenes.is_empty() {
            return Err(PipelineError::Parse(format!(
                "plan for '{}' has no scenes",
                candidate.concept_name
            )));
        }
        let scene_total: f64 = self.scenes.iter().map(|s| s.duration_secs).sum();
        Ok(Plan {
            concept_name: self
                .concept_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| candidate.concept_name.clone()),
            kind: self.visualization_type.unwrap_or(candidate.kind),
            duration_secs: self
                .duration_seconds
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(scene_total),
            scenes: self.scenes,
            narration_points: self.narration_points,
        })
    }
}

/// Turns a candidate into an ordered storyboard.
pub struct VisualizationPlanner {
    llm: Arc<dyn LlmService>,
    max_tokens: u32,
}

impl VisualizationPlanner {
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
impl PlanBuilder for VisualizationPlanner {
    async fn plan(
        &self,
        candidate: &Candidate,
        section_content: &str,
        paper_context: &str,
    ) -> PipelineResult<Plan> {
        let prompt = prompts::render(
            prompts::PLANNER,
            &[
                ("concept_name", &candidate.concept_name),
                ("visualization_type", candidate.kind.as_str()),
                ("concept_description", &candidate.concept_description),
                ("section_content", section_content),
                ("paper_context", paper_context),
            ],
        );
        let response = self
            .llm
            .complete(prompts::SYSTEM, &prompt, self.max_tokens)
            .await?;
        let draft: PlanDraft = parse_json(&response)?;
        draft.into_plan(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedLlm;

    fn candidate() -> Candidate {
        Candidate {
            section_id: "3.2".to_string(),
            concept_name: "Multi-Head Attention".to_string(),
            concept_description: "Several attention heads in parallel".to_string(),
            kind: VisualizationKind::Architecture,
            priority: 4,
            context: String::new(),
        }
    }

    #[tokio::test]
    async fn test_plan_fills_missing_fields_from_candidate() {
        let llm = ScriptedLlm::new().reply(
            r#"{"scenes": [
                {"order": 1, "description": "Split into heads", "duration_seconds": 12},
                {"order": 2, "description": "Concatenate", "duration_seconds": 18}
            ], "narration_points": ["Each head looks at a different subspace."]}"#,
        );
        let plan = VisualizationPlanner::new(Arc::new(llm.clone()))
            .plan(&candidate(), "section text", "Title: Attention")
            .await
            .unwrap();

        assert_eq!(plan.concept_name, "Multi-Head Attention");
        assert_eq!(plan.kind, VisualizationKind::Architecture);
        assert_eq!(plan.duration_secs, 30.0);
        assert_eq!(plan.scenes.len(), 2);
        assert!(llm.requests()[0].prompt.contains("(architecture)"));
    }

    #[tokio::test]
    async fn test_plan_without_scenes_is_parse_error() {
        let llm = ScriptedLlm::new().reply(r#"{"concept_name": "x", "scenes": []}"#);
        let err = VisualizationPlanner::new(Arc::new(llm))
            .plan(&candidate(), "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }
}
