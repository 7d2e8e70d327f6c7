//! LLM-backed narration judge.

use std::sync::Arc;

use arxiviz_core::{Candidate, JudgeScores, NarrationJudge, Plan};
use async_trait::async_trait;
use tracing::debug;

use crate::client::LlmService;
use crate::extract::parse_json;

/// Scores narration with a rubric prompt. Any failure means "no opinion".
pub struct LlmNarrationJudge {
    llm: Arc<dyn LlmService>,
    max_tokens: u32,
}

impl LlmNarrationJudge {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            max_tokens: 512,
        }
    }

    fn prompt(candidate: &Candidate, plan: &Plan, narrations: &[String]) -> String {
        let scenes = serde_json::to_string_pretty(&plan.scenes).unwrap_or_default();
        let lines = serde_json::to_string(narrations).unwrap_or_default();
        format!(
            "You are an evaluator of educational narration quality.\n\
             Return JSON only with keys: score_alignment, score_educational, issues.\n\
             Scores must be floats in [0,1].\n\n\
             Concept: {}\n\
             Concept description: {}\n\
             Section context: {}\n\
             Plan scenes: {scenes}\n\
             Narrations: {lines}\n\n\
             Rubric:\n\
             - score_alignment: how well narration matches the concept and planned beats\n\
             - score_educational: plain-language, technically accurate tutoring; not animation commands\n\
             - issues: short list of concrete problems\n",
            candidate.concept_name, candidate.concept_description, candidate.context,
        )
    }
}

#[async_trait]
impl NarrationJudge for LlmNarrationJudge {
    async fn judge(
        &self,
        candidate: &Candidate,
        plan: &Plan,
        narrations: &[String],
    ) -> Option<JudgeScores> {
        let prompt = Self::prompt(candidate, plan, narrations);
        let response = match self.llm.complete("", &prompt, self.max_tokens).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "narration judge unavailable");
                return None;
            }
        };
        match parse_json::<JudgeScores>(&response) {
            Ok(scores) => Some(scores),
            Err(e) => {
                debug!(error = %e, "narration judge returned unusable output");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedLlm;
    use arxiviz_core::{Scene, VisualizationKind};

    fn inputs() -> (Candidate, Plan) {
        let candidate = Candidate {
            section_id: "s".to_string(),
            concept_name: "Softmax".to_string(),
            concept_description: "Normalizes scores".to_string(),
            kind: VisualizationKind::Equation,
            priority: 3,
            context: "softmax over keys".to_string(),
        };
        let plan = Plan {
            concept_name: "Softmax".to_string(),
            kind: VisualizationKind::Equation,
            duration_secs: 30.0,
            scenes: vec![Scene {
                order: 1,
                description: "Exponentiate and normalize".to_string(),
                duration_secs: 30.0,
                transitions: String::new(),
                elements: vec![],
            }],
            narration_points: vec![],
        };
        (candidate, plan)
    }

    #[tokio::test]
    async fn test_fenced_scores_are_parsed() {
        let llm = ScriptedLlm::new().reply(
            "```json\n{\"score_alignment\": 0.9, \"score_educational\": 0.8, \"issues\": []}\n```",
        );
        let (candidate, plan) = inputs();
        let scores = LlmNarrationJudge::new(Arc::new(llm.clone()))
            .judge(&candidate, &plan, &["Softmax turns scores into weights.".to_string()])
            .await
            .unwrap();

        assert_eq!(scores.score_alignment, 0.9);
        let request = &llm.requests()[0];
        assert_eq!(request.max_tokens, 512);
        assert!(request.prompt.contains("Softmax turns scores into weights."));
    }

    #[tokio::test]
    async fn test_failures_yield_no_opinion() {
        let (candidate, plan) = inputs();
        for llm in [
            ScriptedLlm::new().fail("timeout"),
            ScriptedLlm::new().reply("looks great to me"),
            ScriptedLlm::new().reply(r#"{"score_alignment": "high"}"#),
        ] {
            let judged = LlmNarrationJudge::new(Arc::new(llm))
                .judge(&candidate, &plan, &[])
                .await;
            assert!(judged.is_none());
        }
    }
}
