//! Structured lifecycle events for pipeline runs.
//!
//! Events go out at `info!` (rejections and drops at `warn!`) with an
//! `event` field so they can be filtered in JSON logs:
//! `pipeline.started`, `candidate.started`, `gate.evaluated`,
//! `attempt.rejected`, `candidate.finished`, `pipeline.finished`.

use tracing::{info, warn};

use crate::gate::GateKind;

/// Span covering one candidate's retry loop. Attach with `Instrument`.
pub fn candidate_span(concept: &str, section_id: &str) -> tracing::Span {
    tracing::info_span!("arxiviz.candidate", candidate = %concept, section = %section_id)
}

/// How a candidate's retry loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Accepted,
    Dropped,
    Degraded,
    Aborted,
}

impl CandidateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Dropped => "dropped",
            Self::Degraded => "degraded",
            Self::Aborted => "aborted",
        }
    }
}

/// Emit event: pipeline run started for a paper.
///
/// ```rust,no_run
/// use arxiviz_core::obs::emit_pipeline_started;
/// emit_pipeline_started("Attention Is All You Need", 6, 5);
/// // logs: event=pipeline.started paper="Attention Is All You Need" sections=6 max_visualizations=5
/// ```
pub fn emit_pipeline_started(paper_title: &str, sections: usize, max_visualizations: usize) {
    info!(
        event = "pipeline.started",
        paper = %paper_title,
        sections = sections,
        max_visualizations = max_visualizations,
    );
}

/// Emit event: retry loop started for a candidate with its attempt budget.
pub fn emit_candidate_started(concept: &str, budget: u32) {
    info!(event = "candidate.started", candidate = %concept, budget = budget);
}

/// Emit event: one gate ran on an attempt, with its verdict and issue count.
pub fn emit_gate_evaluated(concept: &str, attempt: u32, gate: GateKind, passed: bool, issues: usize) {
    info!(
        event = "gate.evaluated",
        candidate = %concept,
        attempt = attempt,
        gate = %gate,
        passed = passed,
        issues = issues,
    );
}

/// Emit event: attempt rejected by a blocking gate (warning level).
pub fn emit_attempt_rejected(concept: &str, attempt: u32, gate: GateKind) {
    warn!(event = "attempt.rejected", candidate = %concept, attempt = attempt, gate = %gate);
}

/// Emit event: retry loop ended. Anything other than accepted logs at warning level.
pub fn emit_candidate_finished(concept: &str, attempts: u32, outcome: CandidateOutcome) {
    if outcome == CandidateOutcome::Accepted {
        info!(event = "candidate.finished", candidate = %concept, attempts = attempts, outcome = outcome.as_str());
    } else {
        warn!(event = "candidate.finished", candidate = %concept, attempts = attempts, outcome = outcome.as_str());
    }
}

/// Emit event: collaborator failure dropped a candidate outright (warning level).
pub fn emit_candidate_error(concept: &str, error: &dyn std::fmt::Display) {
    warn!(event = "candidate.finished", candidate = %concept, outcome = "failed", error = %error);
}

/// Emit event: pipeline run finished with accepted count and duration.
pub fn emit_pipeline_finished(paper_title: &str, candidates: usize, accepted: usize, duration_ms: u64) {
    info!(
        event = "pipeline.finished",
        paper = %paper_title,
        candidates = candidates,
        accepted = accepted,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_span_enter() {
        let _entered = candidate_span("Attention", "section-1").entered();
        emit_gate_evaluated("Attention", 1, GateKind::Spatial, true, 0);
    }
}
