//! Candidate → artifact orchestration.
//!
//! Per candidate: plan once, then up to `attempt_budget()` cycles of
//! generate → structure → spatial → narration → render. The first blocking
//! gate ends the attempt; everything the gates that ran had to say becomes
//! the feedback for the next generation. When the budget runs out the
//! [`FailurePolicy`] decides the outcome.
//!
//! Candidates of one paper run concurrently on the calling task. A
//! collaborator failure drops that candidate only; the hard-error policy is
//! the one way to abort the whole run.

use std::sync::Arc;
use std::time::Instant;

use futures::future::{join_all, try_join_all};
use tracing::{debug, info, instrument, warn, Instrument};

use crate::agents::{
    CandidateExtractor, CodeGenerator, GenerationOptions, PlanBuilder, SectionAnalysis,
};
use crate::config::{FailurePolicy, PipelineConfig};
use crate::domain::{
    new_visualization_id, rank_candidates, Candidate, GeneratedCode, Paper, PipelineError,
    PipelineResult, Plan, Section, Visualization,
};
use crate::gate::{GateKind, Gates};
use crate::obs::{self, CandidateOutcome};
use crate::store::VisualizationStore;

/// Feedback used when a rejected attempt produced no issue text.
pub const FALLBACK_FEEDBACK: &str =
    "Unknown issue; regenerate with cleaner structure and narration alignment.";

/// Result of running the gates over one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    pub attempt: u32,
    /// Gates that ran, in order.
    pub gates_run: Vec<GateKind>,
    /// The gate that ended the attempt, if any.
    pub rejected_by: Option<GateKind>,
    /// Feedback blocks from every gate that ran.
    pub feedback: Vec<String>,
}

impl AttemptReport {
    fn new(attempt: u32) -> Self {
        Self {
            attempt,
            gates_run: Vec::new(),
            rejected_by: None,
            feedback: Vec::new(),
        }
    }

    pub fn accepted(&self) -> bool {
        self.rejected_by.is_none()
    }

    /// Combined feedback text for the next generation.
    pub fn feedback_text(&self) -> String {
        if self.feedback.is_empty() {
            FALLBACK_FEEDBACK.to_string()
        } else {
            self.feedback.join("\n")
        }
    }

    fn record(
        &mut self,
        concept: &str,
        gate: GateKind,
        blocks: bool,
        issues: usize,
        feedback: Option<String>,
    ) -> bool {
        obs::emit_gate_evaluated(concept, self.attempt, gate, !blocks, issues);
        self.gates_run.push(gate);
        self.feedback.extend(feedback);
        if blocks {
            self.rejected_by = Some(gate);
            obs::emit_attempt_rejected(concept, self.attempt, gate);
        }
        blocks
    }
}

/// The generation-and-validation orchestrator.
///
/// Holds no per-run state; one instance can serve many papers.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    extractor: Arc<dyn CandidateExtractor>,
    planner: Arc<dyn PlanBuilder>,
    generator: Arc<dyn CodeGenerator>,
    gates: Gates,
    store: Option<Arc<dyn VisualizationStore>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        extractor: Arc<dyn CandidateExtractor>,
        planner: Arc<dyn PlanBuilder>,
        generator: Arc<dyn CodeGenerator>,
        gates: Gates,
    ) -> Self {
        Self {
            config,
            extractor,
            planner,
            generator,
            gates,
            store: None,
        }
    }

    /// Persist every emitted visualization.
    pub fn with_store(mut self, store: Arc<dyn VisualizationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Produce the accepted visualizations for a paper.
    ///
    /// An empty list is a valid result. Only the hard-error failure policy
    /// makes this return an error.
    #[instrument(skip(self, paper), fields(paper = %paper.title))]
    pub async fn run(
        &self,
        paper: &Paper,
        max_visualizations: usize,
    ) -> PipelineResult<Vec<Visualization>> {
        let started = Instant::now();
        obs::emit_pipeline_started(&paper.title, paper.sections.len(), max_visualizations);

        let candidates = self.extract_candidates(paper, max_visualizations).await;
        info!(candidates = candidates.len(), "candidates selected");

        let results = if self.config.concurrent_generation {
            try_join_all(candidates.iter().map(|c| self.run_candidate(c, paper))).await?
        } else {
            let mut results = Vec::with_capacity(candidates.len());
            for candidate in &candidates {
                results.push(self.run_candidate(candidate, paper).await?);
            }
            results
        };

        let accepted: Vec<Visualization> = results.into_iter().flatten().collect();
        obs::emit_pipeline_finished(
            &paper.title,
            candidates.len(),
            accepted.len(),
            started.elapsed().as_millis() as u64,
        );
        Ok(accepted)
    }

    /// Analyze the eligible sections and keep the top `max` candidates.
    ///
    /// Sections whose analysis fails are logged and skipped.
    pub async fn extract_candidates(&self, paper: &Paper, max: usize) -> Vec<Candidate> {
        let sections = paper.eligible_sections();
        debug!(eligible = sections.len(), "analyzing sections");

        let analyses = if self.config.concurrent_analysis {
            join_all(
                sections
                    .iter()
                    .copied()
                    .map(|s| self.analyze_section(paper, s)),
            )
            .await
        } else {
            let mut out = Vec::with_capacity(sections.len());
            for section in sections.iter().copied() {
                out.push(self.analyze_section(paper, section).await);
            }
            out
        };

        let mut candidates = Vec::new();
        for (section, result) in analyses {
            match result {
                Ok(analysis) if analysis.needs_visualization => {
                    for mut candidate in analysis.candidates {
                        if candidate.section_id.is_empty() {
                            candidate.section_id = section.id.clone();
                        }
                        candidates.push(candidate);
                    }
                }
                Ok(analysis) => {
                    debug!(section = %section.id, reason = %analysis.reasoning, "section skipped")
                }
                Err(e) => warn!(section = %section.id, error = %e, "section analysis failed"),
            }
        }

        rank_candidates(candidates, max)
    }

    async fn analyze_section<'a>(
        &self,
        paper: &Paper,
        section: &'a Section,
    ) -> (&'a Section, PipelineResult<SectionAnalysis>) {
        let result = self
            .extractor
            .analyze(&paper.title, &paper.abstract_text, section)
            .await;
        (section, result)
    }

    /// Run one candidate through planning and the retry loop.
    ///
    /// `Ok(None)` means the candidate was dropped, either by policy or
    /// because a collaborator failed. `Err` only under the hard-error policy.
    pub async fn run_candidate(
        &self,
        candidate: &Candidate,
        paper: &Paper,
    ) -> PipelineResult<Option<Visualization>> {
        let span = obs::candidate_span(&candidate.concept_name, &candidate.section_id);
        async {
            match self.process_candidate(candidate, paper).await {
                Ok(visualization) => Ok(visualization),
                Err(e) if e.is_fatal_for_paper() => Err(e),
                Err(e) => {
                    obs::emit_candidate_error(&candidate.concept_name, &e);
                    Ok(None)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process_candidate(
        &self,
        candidate: &Candidate,
        paper: &Paper,
    ) -> PipelineResult<Option<Visualization>> {
        let section_content = paper
            .section(&candidate.section_id)
            .map(|s| s.content.as_str())
            .unwrap_or(candidate.context.as_str());
        let plan = self
            .planner
            .plan(candidate, section_content, &paper.context())
            .await?;

        let options = GenerationOptions::from(&self.config.voice);
        let budget = self.config.attempt_budget().max(1);
        obs::emit_candidate_started(&candidate.concept_name, budget);

        let mut previous: Option<(GeneratedCode, AttemptReport)> = None;
        for attempt in 1..=budget {
            let mut generated = match &previous {
                None => self.generator.generate(&plan, &options).await?,
                Some((code, report)) => {
                    self.generator
                        .generate_with_feedback(&plan, &code.code, &report.feedback_text(), &options)
                        .await?
                }
            };

            let report = self
                .evaluate(&mut generated, &plan, candidate, attempt)
                .await;
            if report.accepted() {
                obs::emit_candidate_finished(&candidate.concept_name, attempt, CandidateOutcome::Accepted);
                let visualization = self.emit(candidate, &plan, generated).await?;
                return Ok(Some(visualization));
            }
            previous = Some((generated, report));
        }

        match self.config.failure_policy {
            FailurePolicy::Drop => {
                obs::emit_candidate_finished(&candidate.concept_name, budget, CandidateOutcome::Dropped);
                Ok(None)
            }
            FailurePolicy::Silent => {
                let Some((generated, report)) = previous else {
                    return Ok(None);
                };
                if report.rejected_by == Some(GateKind::Render) {
                    warn!("emitting code that failed the render test");
                }
                obs::emit_candidate_finished(&candidate.concept_name, budget, CandidateOutcome::Degraded);
                let visualization = self.emit(candidate, &plan, generated).await?;
                Ok(Some(visualization.mark_degraded()))
            }
            FailurePolicy::HardError => {
                obs::emit_candidate_finished(&candidate.concept_name, budget, CandidateOutcome::Aborted);
                Err(PipelineError::QualityGateExhausted {
                    concept: candidate.concept_name.clone(),
                    attempts: budget,
                })
            }
        }
    }

    /// Run the enabled gates in order, stopping at the first blocking one.
    ///
    /// The structural gate's output replaces `generated` even when it passes.
    async fn evaluate(
        &self,
        generated: &mut GeneratedCode,
        plan: &Plan,
        candidate: &Candidate,
        attempt: u32,
    ) -> AttemptReport {
        let concept = candidate.concept_name.as_str();
        let mut report = AttemptReport::new(attempt);

        let structure = self.gates.structure.check(&generated.code);
        if structure.code != generated.code {
            generated.replace_code(structure.code.clone());
        }
        if !structure.fixed.is_empty() {
            debug!(fixed = ?structure.fixed, "structural gate repaired code");
        }
        if report.record(
            concept,
            GateKind::Structure,
            structure.blocks(),
            structure.issues.len(),
            structure.feedback(),
        ) {
            return report;
        }

        if self.config.spatial_validation {
            if let Some(gate) = &self.gates.spatial {
                let spatial = gate.check(&generated.code);
                if report.record(
                    concept,
                    GateKind::Spatial,
                    spatial.blocks(),
                    spatial.issues().len(),
                    spatial.feedback(),
                ) {
                    return report;
                }
            }
        }

        if self.config.narration_active() {
            if let Some(gate) = &self.gates.narration {
                generated.enable_narration();
                let narration = gate.check(generated, plan, candidate).await;
                if report.record(
                    concept,
                    GateKind::Narration,
                    narration.blocks(),
                    narration.issues.len(),
                    narration.feedback(),
                ) {
                    return report;
                }
            }
        }

        if self.config.render_testing {
            if let Some(gate) = &self.gates.render {
                let render = gate.check(&generated.code, &generated.scene_class_name).await;
                report.record(
                    concept,
                    GateKind::Render,
                    render.blocks(),
                    usize::from(!render.success),
                    render.feedback(),
                );
            }
        }

        report
    }

    async fn emit(
        &self,
        candidate: &Candidate,
        plan: &Plan,
        generated: GeneratedCode,
    ) -> PipelineResult<Visualization> {
        let visualization = Visualization::pending(
            new_visualization_id(),
            candidate,
            plan,
            generated.code,
            generated.scene_class_name,
        );
        if let Some(store) = &self.store {
            store.create(&visualization).await?;
        }
        Ok(visualization)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("gates", &self.gates)
            .field("store", &self.store.is_some())
            .finish()
    }
}
