//! Narration quality gate.
//!
//! Layered checks over narrated scene code:
//! 1. structural requirements (voiceover base class, speech service, at
//!    least one narration block), always hard failures
//! 2. per-line lexical scores (alignment with the concept, educational
//!    tone), averaged over the lines
//! 3. optional judge scores, which replace the lexical ones when valid
//! 4. threshold comparison
//!
//! The lexical scorers need no network and always produce a signal.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::NarrationConfig;
use crate::domain::{Candidate, GeneratedCode, Plan};
use crate::gate::{NarrationCheck, NarrationReport};
use crate::inspect;

/// Openers that read like stage directions rather than teaching.
pub const COMMAND_OPENERS: &[&str] = &[
    "display", "show", "fade", "animate", "create", "draw", "move", "write",
];

/// Domain vocabulary that rewards ML terminology in narration.
pub const ANCHOR_TERMS: &[&str] = &[
    "query",
    "key",
    "value",
    "attention",
    "softmax",
    "weight",
    "score",
    "representation",
    "token",
    "context",
];

const STOPWORDS: &[&str] = &[
    "the", "and", "that", "with", "from", "this", "these", "those", "into", "onto", "their",
    "about", "each", "for", "are", "its", "while", "where", "when", "then", "using", "through",
    "across", "between", "before", "after", "over", "under",
];

static TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z][a-z0-9_-]{2,}").expect("static regex"));

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9']+").expect("static regex"));

/// Light stemming: `queries` -> `query`, `keys` -> `key`.
pub fn normalize_token(token: &str) -> String {
    if token.len() > 4 {
        if let Some(stem) = token.strip_suffix("ies") {
            return format!("{stem}y");
        }
    }
    if token.len() > 3 {
        if let Some(stem) = token.strip_suffix('s') {
            return stem.to_string();
        }
    }
    token.to_string()
}

/// Stopword-filtered, normalized content terms of a text.
pub fn content_terms(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    TERM_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !STOPWORDS.contains(t))
        .map(normalize_token)
        .collect()
}

/// Reference terms for a candidate: concept name, description and context.
pub fn reference_terms(candidate: &Candidate) -> HashSet<String> {
    content_terms(&format!(
        "{} {} {}",
        candidate.concept_name, candidate.concept_description, candidate.context
    ))
}

pub fn word_count(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

pub fn starts_with_command(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    COMMAND_OPENERS.iter().any(|op| lower.starts_with(op))
}

/// Alignment of one narration line with the reference terms, in [0, 1].
///
/// `0.45 + 0.20 * min(3, anchor hits) + 0.25 * overlap ratio`, where the
/// overlap ratio divides by the line's term count capped at 8. A line with
/// no content terms scores 0; an empty reference set scores 0.5.
pub fn alignment_score(line: &str, reference: &HashSet<String>) -> f64 {
    let terms = content_terms(line);
    if terms.is_empty() {
        return 0.0;
    }
    if reference.is_empty() {
        return 0.5;
    }

    let overlap = terms.intersection(reference).count();
    let overlap_ratio = overlap as f64 / terms.len().clamp(1, 8) as f64;
    let anchor_hits = terms
        .iter()
        .filter(|t| ANCHOR_TERMS.contains(&t.as_str()))
        .count();

    let score = 0.45 + 0.20 * anchor_hits.min(3) as f64 + 0.25 * overlap_ratio;
    score.clamp(0.0, 1.0)
}

/// Penalty-based tone score of one narration line, in [0, 1].
pub fn educational_score(line: &str, min_words: usize) -> f64 {
    let lower = line.to_lowercase();
    let mut penalty: f64 = 0.0;
    if starts_with_command(&lower) {
        penalty += 0.45;
    }
    if lower.contains("screen") {
        penalty += 0.20;
    }
    if lower.contains("watch") || lower.contains("now we") {
        penalty += 0.15;
    }
    if word_count(line) < min_words {
        penalty += 0.20;
    }
    (0.95 - penalty).clamp(0.0, 1.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Scores returned by an external judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeScores {
    pub score_alignment: f64,
    pub score_educational: f64,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl JudgeScores {
    /// Both scores finite and within [0, 1].
    pub fn is_valid(&self) -> bool {
        [self.score_alignment, self.score_educational]
            .iter()
            .all(|s| s.is_finite() && (0.0..=1.0).contains(s))
    }
}

/// Independent scorer for narration quality.
///
/// Returning `None` means "no opinion"; the lexical scores are used instead.
#[async_trait]
pub trait NarrationJudge: Send + Sync {
    async fn judge(
        &self,
        candidate: &Candidate,
        plan: &Plan,
        narrations: &[String],
    ) -> Option<JudgeScores>;
}

/// The narration quality gate.
#[derive(Clone)]
pub struct NarrationValidator {
    config: NarrationConfig,
    strict: bool,
    judge: Option<Arc<dyn NarrationJudge>>,
}

impl NarrationValidator {
    pub fn new(config: NarrationConfig, strict: bool) -> Self {
        Self {
            config,
            strict,
            judge: None,
        }
    }

    /// Attach a judge. Ignored when `use_llm_judge` is off.
    pub fn with_judge(mut self, judge: Arc<dyn NarrationJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    fn structural_issues(code: &str) -> Vec<String> {
        let mut issues = Vec::new();
        if !inspect::scene_base_classes(code)
            .iter()
            .any(|b| b == "VoiceoverScene")
        {
            issues.push("Missing VoiceoverScene inheritance.".to_string());
        }
        if !code.contains("set_speech_service(") {
            issues.push("Missing set_speech_service(...) call in construct().".to_string());
        }
        if inspect::narration_blocks(code).is_empty() {
            issues.push("No voiceover narration blocks found.".to_string());
        }
        issues
    }

    pub async fn validate(
        &self,
        generated: &GeneratedCode,
        plan: &Plan,
        candidate: &Candidate,
    ) -> NarrationReport {
        let mut issues = Self::structural_issues(&generated.code);
        let narrations = &generated.narration_lines;

        if self.config.min_narration_lines > 0 && narrations.len() < self.config.min_narration_lines
        {
            issues.push(format!(
                "Only {} narration line(s); at least {} required.",
                narrations.len(),
                self.config.min_narration_lines
            ));
        }

        let reference = reference_terms(candidate);
        let mut alignment = Vec::with_capacity(narrations.len());
        let mut educational = Vec::with_capacity(narrations.len());
        for (idx, line) in narrations.iter().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if starts_with_command(line) {
                issues.push(format!(
                    "Narration {} starts with animation command style wording.",
                    idx + 1
                ));
            }
            if word_count(line) > self.config.max_words {
                debug!(line = idx + 1, max_words = self.config.max_words, "narration line is long");
            }
            alignment.push(alignment_score(line, &reference));
            educational.push(educational_score(line, self.config.min_words));
        }

        let mut score_alignment = mean(&alignment);
        let mut score_educational = mean(&educational);

        if let Some(judge) = self.judge.as_ref().filter(|_| self.config.use_llm_judge) {
            if !narrations.is_empty() {
                match judge.judge(candidate, plan, narrations).await {
                    Some(scores) if scores.is_valid() => {
                        debug!(
                            alignment = scores.score_alignment,
                            educational = scores.score_educational,
                            "judge scores replace lexical scores"
                        );
                        score_alignment = scores.score_alignment;
                        score_educational = scores.score_educational;
                    }
                    Some(scores) => warn!(
                        alignment = scores.score_alignment,
                        educational = scores.score_educational,
                        "ignoring out-of-range judge scores"
                    ),
                    None => debug!("judge unavailable, keeping lexical scores"),
                }
            }
        }

        if score_alignment < self.config.alignment_threshold {
            issues.push(format!(
                "Alignment score {:.2} is below threshold {:.2}.",
                score_alignment, self.config.alignment_threshold
            ));
        }
        if score_educational < self.config.educational_threshold {
            issues.push(format!(
                "Educational score {:.2} is below threshold {:.2}.",
                score_educational, self.config.educational_threshold
            ));
        }

        let valid = issues.is_empty();
        NarrationReport {
            valid,
            issues,
            score_alignment: score_alignment.clamp(0.0, 1.0),
            score_educational: score_educational.clamp(0.0, 1.0),
            needs_regeneration: self.strict && !valid,
        }
    }
}

impl std::fmt::Debug for NarrationValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrationValidator")
            .field("config", &self.config)
            .field("strict", &self.strict)
            .field("judge", &self.judge.is_some())
            .finish()
    }
}

#[async_trait]
impl NarrationCheck for NarrationValidator {
    async fn check(
        &self,
        code: &GeneratedCode,
        plan: &Plan,
        candidate: &Candidate,
    ) -> NarrationReport {
        self.validate(code, plan, candidate).await
    }
}
