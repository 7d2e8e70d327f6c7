//! Generated animation source and its derived metadata.

use serde::{Deserialize, Serialize};

use crate::inspect;

/// Source produced by the code generator for one attempt.
///
/// The derived fields are recomputed from the source text whenever the
/// code is replaced, so they never drift from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub code: String,
    pub scene_class_name: String,
    pub dependencies: Vec<String>,
    pub narration_enabled: bool,
    pub narration_lines: Vec<String>,
    pub narration_beats: Vec<String>,
}

impl GeneratedCode {
    /// Build from raw source, deriving scene name, dependencies and narration metadata.
    pub fn from_source(code: impl Into<String>, narration_enabled: bool) -> Self {
        let mut generated = Self {
            code: code.into(),
            scene_class_name: String::new(),
            dependencies: Vec::new(),
            narration_enabled,
            narration_lines: Vec::new(),
            narration_beats: Vec::new(),
        };
        generated.refresh();
        generated
    }

    /// Replace the source (e.g. with the structural gate's rewrite).
    pub fn replace_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.refresh();
    }

    /// Mark the source as narrated and re-derive its narration metadata.
    pub fn enable_narration(&mut self) {
        if !self.narration_enabled {
            self.narration_enabled = true;
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        self.scene_class_name = inspect::extract_scene_class_name(&self.code);
        self.dependencies = vec!["manim".to_string()];
        if self.narration_enabled {
            self.dependencies.push("manim_voiceover".to_string());
            self.narration_lines = inspect::extract_narration_lines(&self.code);
            self.narration_beats = inspect::extract_beat_labels(&self.code);
        } else {
            self.narration_lines.clear();
            self.narration_beats.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOICE_CODE: &str = r#"from manim import *
from manim_voiceover import VoiceoverScene

class AttentionScene(VoiceoverScene):
    def construct(self):
        # Beat 1: setup
        with self.voiceover(text="Each query is compared with every key.") as tracker:
            self.play(Create(Square()), run_time=tracker.duration)
"#;

    #[test]
    fn test_from_source_derives_metadata() {
        let code = GeneratedCode::from_source(VOICE_CODE, true);
        assert_eq!(code.scene_class_name, "AttentionScene");
        assert_eq!(code.dependencies, vec!["manim", "manim_voiceover"]);
        assert_eq!(code.narration_lines, vec!["Each query is compared with every key."]);
        assert_eq!(code.narration_beats, vec!["# Beat 1: setup"]);
    }

    #[test]
    fn test_narration_disabled_skips_extraction() {
        let code = GeneratedCode::from_source(VOICE_CODE, false);
        assert_eq!(code.dependencies, vec!["manim"]);
        assert!(code.narration_lines.is_empty());
        assert!(code.narration_beats.is_empty());
    }

    #[test]
    fn test_enable_narration_rederives_lines() {
        let mut code = GeneratedCode::from_source(VOICE_CODE, false);
        code.enable_narration();
        assert!(code.narration_enabled);
        assert_eq!(code.narration_lines, vec!["Each query is compared with every key."]);
        assert_eq!(code.dependencies, vec!["manim", "manim_voiceover"]);
    }

    #[test]
    fn test_replace_code_refreshes_fields() {
        let mut code = GeneratedCode::from_source(VOICE_CODE, true);
        code.replace_code("class Other(Scene):\n    def construct(self):\n        pass\n");
        assert_eq!(code.scene_class_name, "Other");
        assert!(code.narration_lines.is_empty());
    }
}
