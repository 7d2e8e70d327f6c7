//! Visualization candidates proposed by the extractor.

use serde::{Deserialize, Serialize};

/// Visualization category a candidate falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationKind {
    Equation,
    Architecture,
    DataFlow,
    Algorithm,
    Matrix,
    #[serde(alias = "3d")]
    ThreeD,
}

impl VisualizationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equation => "equation",
            Self::Architecture => "architecture",
            Self::DataFlow => "data_flow",
            Self::Algorithm => "algorithm",
            Self::Matrix => "matrix",
            Self::ThreeD => "three_d",
        }
    }
}

impl std::fmt::Display for VisualizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concept from one section that is worth animating.
///
/// Immutable once extracted; consumed once per pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub section_id: String,
    pub concept_name: String,
    #[serde(default)]
    pub concept_description: String,
    #[serde(rename = "visualization_type")]
    pub kind: VisualizationKind,
    /// Higher is more important.
    pub priority: i32,
    /// Free text used for narration alignment scoring.
    #[serde(default)]
    pub context: String,
}

/// Rank candidates by descending priority and keep at most `max`.
///
/// The sort is stable, so equal priorities keep extraction order.
pub fn rank_candidates(mut candidates: Vec<Candidate>, max: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    candidates.truncate(max);
    candidates
}
