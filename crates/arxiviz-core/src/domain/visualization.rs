//! Final persisted artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::candidate::Candidate;
use super::plan::Plan;

/// Lifecycle of a persisted visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationStatus {
    Pending,
    Rendering,
    Complete,
    Failed,
}

impl VisualizationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl std::fmt::Display for VisualizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Rendering => "rendering",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A visualization emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visualization {
    pub id: String,
    pub section_id: String,
    pub concept: String,
    /// Serialized storyboard.
    pub storyboard: String,
    pub manim_code: String,
    /// Scene class to hand to the renderer.
    pub scene_class_name: String,
    /// SHA-256 of `manim_code`.
    pub code_digest: String,
    pub video_url: Option<String>,
    pub status: VisualizationStatus,
    /// Set when emitted under the silent failure policy despite a failing gate.
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl Visualization {
    /// Create a pending visualization for a candidate.
    pub fn pending(
        id: impl Into<String>,
        candidate: &Candidate,
        plan: &Plan,
        code: impl Into<String>,
        scene_class_name: impl Into<String>,
    ) -> Self {
        let manim_code = code.into();
        Self {
            id: id.into(),
            section_id: candidate.section_id.clone(),
            concept: candidate.concept_name.clone(),
            storyboard: plan.storyboard_json(),
            code_digest: code_digest(&manim_code),
            manim_code,
            scene_class_name: scene_class_name.into(),
            video_url: None,
            status: VisualizationStatus::Pending,
            degraded: false,
            created_at: Utc::now(),
        }
    }

    pub fn mark_degraded(mut self) -> Self {
        self.degraded = true;
        self
    }
}

/// Generate a fresh visualization id (`viz_` + 8 hex chars).
pub fn new_visualization_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("viz_{}", &hex[..8])
}

/// SHA-256 hex digest of source code.
pub fn code_digest(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candidate::VisualizationKind;

    #[test]
    fn test_new_visualization_id_shape() {
        let id = new_visualization_id();
        assert!(id.starts_with("viz_"));
        assert_eq!(id.len(), 12);
        assert_ne!(id, new_visualization_id());
    }

    #[test]
    fn test_code_digest_is_deterministic() {
        assert_eq!(code_digest("a"), code_digest("a"));
        assert_ne!(code_digest("a"), code_digest("b"));
        assert_eq!(code_digest("").len(), 64);
    }

    #[test]
    fn test_pending_visualization_fields() {
        let candidate = Candidate {
            section_id: "section-3-2".to_string(),
            concept_name: "Attention".to_string(),
            concept_description: String::new(),
            kind: VisualizationKind::DataFlow,
            priority: 5,
            context: String::new(),
        };
        let plan = Plan {
            concept_name: "Attention".to_string(),
            kind: VisualizationKind::DataFlow,
            duration_secs: 30.0,
            scenes: vec![],
            narration_points: vec![],
        };

        let viz = Visualization::pending("viz_1", &candidate, &plan, "code", "Scene1");
        assert_eq!(viz.status, VisualizationStatus::Pending);
        assert_eq!(viz.section_id, "section-3-2");
        assert_eq!(viz.code_digest, code_digest("code"));
        assert!(!viz.degraded);
        assert!(viz.mark_degraded().degraded);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&VisualizationStatus::Complete).unwrap();
        assert_eq!(json, "\"complete\"");
        assert!(VisualizationStatus::Failed.is_terminal());
        assert!(!VisualizationStatus::Rendering.is_terminal());
    }
}
