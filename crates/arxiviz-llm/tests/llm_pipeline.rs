use std::sync::Arc;

use arxiviz_core::fakes::{self, CallLog, ScriptedGate};
use arxiviz_core::{
    Gates, NarrationValidator, Pipeline, PipelineConfig, RenderReport, SpatialValidator,
    StructuralValidator,
};
use arxiviz_llm::fakes::ScriptedLlm;
use arxiviz_llm::{LlmNarrationJudge, ManimGenerator, SectionAnalyzer, VisualizationPlanner};

const CONCEPT: &str = "Scaled Dot-Product Attention";

fn analysis_reply() -> String {
    let candidate = fakes::candidate("", CONCEPT, 5);
    serde_json::json!({
        "needs_visualization": true,
        "reasoning": "central mechanism",
        "candidates": [candidate],
    })
    .to_string()
}

fn plan_reply() -> &'static str {
    r#"```json
{"concept_name": "Scaled Dot-Product Attention", "visualization_type": "data_flow",
 "duration_seconds": 40,
 "scenes": [{"order": 1, "description": "Queries meet keys", "duration_seconds": 20},
            {"order": 2, "description": "Softmax weights", "duration_seconds": 20}],
 "narration_points": ["compare", "normalize"]}
```"#
}

fn fenced(code: &str) -> String {
    format!("Here is the scene.\n```python\n{code}```\n")
}

struct Llms {
    analyzer: ScriptedLlm,
    planner: ScriptedLlm,
    generator: ScriptedLlm,
    judge: ScriptedLlm,
}

fn pipeline(llms: &Llms) -> Pipeline {
    let config = PipelineConfig::default();
    let log = CallLog::new();
    let narration = NarrationValidator::new(config.narration.clone(), config.voice.strict)
        .with_judge(Arc::new(LlmNarrationJudge::new(Arc::new(llms.judge.clone()))));
    let gates = Gates::new(Arc::new(StructuralValidator::new()))
        .with_spatial(Arc::new(SpatialValidator::new(config.spatial.clone())))
        .with_narration(Arc::new(narration))
        .with_render(Arc::new(ScriptedGate::render(log, vec![RenderReport::ok()])));
    Pipeline::new(
        config,
        Arc::new(SectionAnalyzer::new(Arc::new(llms.analyzer.clone()))),
        Arc::new(VisualizationPlanner::new(Arc::new(llms.planner.clone()))),
        Arc::new(ManimGenerator::new(Arc::new(llms.generator.clone()))),
        gates,
    )
}

#[tokio::test]
async fn llm_collaborators_produce_accepted_visualization() {
    let llms = Llms {
        analyzer: ScriptedLlm::new().reply(analysis_reply()),
        planner: ScriptedLlm::new().reply(plan_reply()),
        generator: ScriptedLlm::new().reply(fenced(&fakes::scene_code("AttentionScene"))),
        judge: ScriptedLlm::new()
            .reply(r#"{"score_alignment": 0.92, "score_educational": 0.88, "issues": []}"#),
    };

    let out = pipeline(&llms).run(&fakes::paper(&["s1"]), 3).await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].section_id, "s1");
    assert_eq!(out[0].concept, CONCEPT);
    assert_eq!(out[0].scene_class_name, "AttentionScene");
    assert!(out[0].storyboard.contains("Queries meet keys"));
    assert_eq!(llms.generator.requests().len(), 1);
    assert_eq!(llms.judge.requests().len(), 1);
}

#[tokio::test]
async fn rejected_attempt_feeds_gate_issues_into_next_prompt() {
    let off_screen = fakes::scene_code("AttentionScene").replace("LEFT * 3", "LEFT * 9");
    let llms = Llms {
        analyzer: ScriptedLlm::new().reply(analysis_reply()),
        planner: ScriptedLlm::new().reply(plan_reply()),
        generator: ScriptedLlm::new()
            .reply(fenced(&off_screen))
            .reply(fenced(&fakes::scene_code("AttentionScene"))),
        judge: ScriptedLlm::new().fail("judge offline"),
    };

    let out = pipeline(&llms).run(&fakes::paper(&["s1"]), 3).await.unwrap();

    assert_eq!(out.len(), 1);
    let requests = llms.generator.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].prompt.contains("## Previous Attempt Failed!"));
    assert!(requests[1].prompt.contains("## Previous Attempt Failed!"));
    assert!(requests[1].prompt.contains("LEFT * 9"));
    assert!(requests[1].prompt.contains("SPATIAL ISSUES:"));
}

#[tokio::test]
async fn unparseable_analysis_yields_no_candidates() {
    let llms = Llms {
        analyzer: ScriptedLlm::new().reply("This section is mostly prose."),
        planner: ScriptedLlm::new(),
        generator: ScriptedLlm::new(),
        judge: ScriptedLlm::new(),
    };

    let out = pipeline(&llms).run(&fakes::paper(&["s1", "s2"]), 3).await.unwrap();

    assert!(out.is_empty());
    assert_eq!(llms.analyzer.requests().len(), 2);
    assert!(llms.planner.requests().is_empty());
}
