//! Storyboards produced by the plan builder.

use serde::{Deserialize, Serialize};

use super::candidate::VisualizationKind;

/// One scene of a storyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub order: u32,
    pub description: String,
    #[serde(rename = "duration_seconds")]
    pub duration_secs: f64,
    #[serde(default)]
    pub transitions: String,
    #[serde(default)]
    pub elements: Vec<String>,
}

/// Ordered storyboard for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub concept_name: String,
    #[serde(rename = "visualization_type")]
    pub kind: VisualizationKind,
    #[serde(rename = "duration_seconds")]
    pub duration_secs: f64,
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub narration_points: Vec<String>,
}

impl Plan {
    /// Scenes sorted by their order index.
    pub fn ordered_scenes(&self) -> Vec<&Scene> {
        let mut scenes: Vec<&Scene> = self.scenes.iter().collect();
        scenes.sort_by_key(|s| s.order);
        scenes
    }

    /// Sum of the per-scene durations.
    pub fn scene_duration_secs(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration_secs).sum()
    }

    /// Serialized storyboard persisted with the final artifact.
    pub fn storyboard_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
