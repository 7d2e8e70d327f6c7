//! Scripted collaborators and gates for tests.
//!
//! Every fake writes what it was asked to do into a shared [`CallLog`], so
//! ordering and feedback properties can be asserted on plain values.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agents::{
    CandidateExtractor, CodeGenerator, GenerationOptions, PlanBuilder, SectionAnalysis,
};
use crate::domain::{
    Candidate, GeneratedCode, Paper, PipelineError, PipelineResult, Plan, Scene, Section,
    VisualizationKind,
};
use crate::gate::{
    GateKind, NarrationCheck, NarrationReport, RenderCheck, RenderReport, SpatialCheck,
    SpatialReport, StructureCheck, StructureReport,
};

/// One recorded collaborator or gate invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Analyze { section_id: String },
    Plan { concept: String },
    Generate { concept: String },
    GenerateWithFeedback {
        concept: String,
        previous_code: String,
        feedback: String,
    },
    Gate { gate: GateKind, code: String },
}

/// Shared, append-only record of calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: Call) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Gate invocations in order.
    pub fn gates(&self) -> Vec<GateKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Gate { gate, .. } => Some(gate),
                _ => None,
            })
            .collect()
    }

    /// Number of generation calls (both entry points) for a concept.
    pub fn generations(&self, concept: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| match call {
                Call::Generate { concept: c } | Call::GenerateWithFeedback { concept: c, .. } => {
                    c == concept
                }
                _ => false,
            })
            .count()
    }

    /// `(previous_code, feedback)` of every feedback-mode generation, in order.
    pub fn feedback_requests(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::GenerateWithFeedback {
                    previous_code,
                    feedback,
                    ..
                } => Some((previous_code, feedback)),
                _ => None,
            })
            .collect()
    }
}

/// Minimal narrated scene that passes the real structural, spatial and
/// narration validators for an attention-style candidate.
pub fn scene_code(class_name: &str) -> String {
    format!(
        r#"from manim import *
from manim_voiceover import VoiceoverScene
from manim_voiceover.services.gtts import GTTSService


class {class_name}(VoiceoverScene):
    def construct(self):
        self.set_speech_service(GTTSService())
        # Beat 1: queries meet keys
        with self.voiceover(text="Each query compares itself with every key to produce attention scores.") as tracker:
            grid = Square().move_to(LEFT * 3)
            self.play(Create(grid), run_time=tracker.duration)
        # Beat 2: softmax weights
        with self.voiceover(text="Softmax turns those scores into weights that blend the values together.") as tracker:
            self.play(grid.animate.shift(RIGHT * 2), run_time=tracker.duration)
"#
    )
}

pub fn candidate(section_id: &str, concept: &str, priority: i32) -> Candidate {
    Candidate {
        section_id: section_id.to_string(),
        concept_name: concept.to_string(),
        concept_description: "queries are compared against keys to weight values".to_string(),
        context: "softmax attention scores".to_string(),
        kind: VisualizationKind::DataFlow,
        priority,
    }
}

/// A paper with one eligible section per id.
pub fn paper(section_ids: &[&str]) -> Paper {
    Paper {
        title: "Attention Is All You Need".to_string(),
        abstract_text: "We propose the Transformer.".to_string(),
        sections: section_ids
            .iter()
            .map(|id| {
                Section::new(
                    *id,
                    format!("Section {id}"),
                    "Scaled dot-product attention computes a weighted sum of values, where each weight comes from a query-key compatibility score.",
                )
            })
            .collect(),
    }
}

/// Extractor answering from a per-section script.
#[derive(Debug, Default)]
pub struct ScriptedExtractor {
    analyses: HashMap<String, SectionAnalysis>,
    failing: HashSet<String>,
    log: CallLog,
}

impl ScriptedExtractor {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn with_candidates(mut self, section_id: &str, candidates: Vec<Candidate>) -> Self {
        self.analyses.insert(
            section_id.to_string(),
            SectionAnalysis {
                needs_visualization: true,
                candidates,
                reasoning: String::new(),
            },
        );
        self
    }

    pub fn failing(mut self, section_id: &str) -> Self {
        self.failing.insert(section_id.to_string());
        self
    }
}

#[async_trait]
impl CandidateExtractor for ScriptedExtractor {
    async fn analyze(
        &self,
        _paper_title: &str,
        _paper_abstract: &str,
        section: &Section,
    ) -> PipelineResult<SectionAnalysis> {
        self.log.push(Call::Analyze {
            section_id: section.id.clone(),
        });
        if self.failing.contains(&section.id) {
            return Err(PipelineError::Transport(format!(
                "analysis of {} failed",
                section.id
            )));
        }
        Ok(self.analyses.get(&section.id).cloned().unwrap_or_default())
    }
}

/// Planner returning a one-scene plan named after the candidate.
#[derive(Debug, Default)]
pub struct ScriptedPlanner {
    failing: HashSet<String>,
    log: CallLog,
}

impl ScriptedPlanner {
    pub fn new(log: CallLog) -> Self {
        Self {
            failing: HashSet::new(),
            log,
        }
    }

    pub fn failing(mut self, concept: &str) -> Self {
        self.failing.insert(concept.to_string());
        self
    }
}

#[async_trait]
impl PlanBuilder for ScriptedPlanner {
    async fn plan(
        &self,
        candidate: &Candidate,
        _section_content: &str,
        _paper_context: &str,
    ) -> PipelineResult<Plan> {
        self.log.push(Call::Plan {
            concept: candidate.concept_name.clone(),
        });
        if self.failing.contains(&candidate.concept_name) {
            return Err(PipelineError::Transport("planner unavailable".to_string()));
        }
        Ok(Plan {
            concept_name: candidate.concept_name.clone(),
            kind: candidate.kind,
            duration_secs: 30.0,
            scenes: vec![Scene {
                order: 1,
                description: candidate.concept_description.clone(),
                duration_secs: 30.0,
                transitions: String::new(),
                elements: vec![],
            }],
            narration_points: vec![],
        })
    }
}

/// One scripted generator response.
#[derive(Debug, Clone)]
pub enum Scripted {
    Code(String),
    TransportError(String),
}

/// Generator answering from a per-concept script.
///
/// Each concept's script is consumed in order; the last entry repeats.
/// Unscripted concepts get `scene_code` with an attempt counter comment.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    scripts: HashMap<String, Vec<Scripted>>,
    counters: Mutex<HashMap<String, usize>>,
    log: CallLog,
}

impl ScriptedGenerator {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn script(mut self, concept: &str, responses: Vec<Scripted>) -> Self {
        self.scripts.insert(concept.to_string(), responses);
        self
    }

    fn next(&self, plan: &Plan, options: &GenerationOptions) -> PipelineResult<GeneratedCode> {
        let concept = &plan.concept_name;
        let attempt = {
            let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
            let n = counters.entry(concept.clone()).or_insert(0);
            *n += 1;
            *n
        };

        let response = match self.scripts.get(concept) {
            Some(script) if !script.is_empty() => script[(attempt - 1).min(script.len() - 1)].clone(),
            _ => Scripted::Code(format!(
                "{}# attempt {attempt}\n",
                scene_code(&crate::inspect::scene_class_name_for(concept))
            )),
        };

        match response {
            Scripted::Code(code) => Ok(GeneratedCode::from_source(code, options.narration)),
            Scripted::TransportError(msg) => Err(PipelineError::Transport(msg)),
        }
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        plan: &Plan,
        options: &GenerationOptions,
    ) -> PipelineResult<GeneratedCode> {
        self.log.push(Call::Generate {
            concept: plan.concept_name.clone(),
        });
        self.next(plan, options)
    }

    async fn generate_with_feedback(
        &self,
        plan: &Plan,
        previous_code: &str,
        feedback: &str,
        options: &GenerationOptions,
    ) -> PipelineResult<GeneratedCode> {
        self.log.push(Call::GenerateWithFeedback {
            concept: plan.concept_name.clone(),
            previous_code: previous_code.to_string(),
            feedback: feedback.to_string(),
        });
        self.next(plan, options)
    }
}

/// Structural gate answering from a script of issue lists.
///
/// An empty list passes. The code is echoed back unchanged.
#[derive(Debug, Default)]
pub struct ScriptedStructure {
    script: Vec<Vec<String>>,
    calls: AtomicUsize,
    log: CallLog,
}

impl ScriptedStructure {
    pub fn passing(log: CallLog) -> Self {
        Self::new(log, vec![])
    }

    pub fn new(log: CallLog, script: Vec<Vec<String>>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            log,
        }
    }
}

impl StructureCheck for ScriptedStructure {
    fn check(&self, code: &str) -> StructureReport {
        self.log.push(Call::Gate {
            gate: GateKind::Structure,
            code: code.to_string(),
        });
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.get(n.min(self.script.len().saturating_sub(1))) {
            Some(issues) if !issues.is_empty() => StructureReport::fail(code, issues.clone()),
            _ => StructureReport::pass(code),
        }
    }
}

/// Gate returning scripted reports in order; the last one repeats.
#[derive(Debug)]
pub struct ScriptedGate<R> {
    kind: GateKind,
    script: Vec<R>,
    calls: AtomicUsize,
    log: CallLog,
}

impl<R: Clone> ScriptedGate<R> {
    pub fn new(kind: GateKind, log: CallLog, script: Vec<R>) -> Self {
        assert!(!script.is_empty(), "a scripted gate needs at least one report");
        Self {
            kind,
            script,
            calls: AtomicUsize::new(0),
            log,
        }
    }

    /// How many times the gate ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self, code: &str) -> R {
        self.log.push(Call::Gate {
            gate: self.kind,
            code: code.to_string(),
        });
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.script[n.min(self.script.len() - 1)].clone()
    }
}

impl ScriptedGate<SpatialReport> {
    pub fn spatial(log: CallLog, script: Vec<SpatialReport>) -> Self {
        Self::new(GateKind::Spatial, log, script)
    }
}

impl ScriptedGate<NarrationReport> {
    pub fn narration(log: CallLog, script: Vec<NarrationReport>) -> Self {
        Self::new(GateKind::Narration, log, script)
    }
}

impl ScriptedGate<RenderReport> {
    pub fn render(log: CallLog, script: Vec<RenderReport>) -> Self {
        Self::new(GateKind::Render, log, script)
    }
}

impl SpatialCheck for ScriptedGate<SpatialReport> {
    fn check(&self, code: &str) -> SpatialReport {
        self.next(code)
    }
}

#[async_trait]
impl NarrationCheck for ScriptedGate<NarrationReport> {
    async fn check(&self, code: &GeneratedCode, _plan: &Plan, _candidate: &Candidate) -> NarrationReport {
        self.next(&code.code)
    }
}

#[async_trait]
impl RenderCheck for ScriptedGate<RenderReport> {
    async fn check(&self, code: &str, _scene_class_name: &str) -> RenderReport {
        tokio::task::yield_now().await;
        self.next(code)
    }
}
