//! Pipeline configuration.
//!
//! Every field has a default, so an empty TOML file is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{PipelineError, PipelineResult};

/// What happens to a candidate whose attempt budget runs out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Emit nothing for the candidate.
    #[default]
    #[serde(alias = "drop_viz")]
    Drop,
    /// Emit the last attempt's code as a degraded pending artifact.
    #[serde(alias = "return_silent")]
    Silent,
    /// Abort the whole paper run.
    HardError,
}

/// Speech backend configured inside generated scenes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsService {
    Gtts,
    Azure,
    #[default]
    Elevenlabs,
    Recorder,
}

impl TtsService {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gtts => "gtts",
            Self::Azure => "azure",
            Self::Elevenlabs => "elevenlabs",
            Self::Recorder => "recorder",
        }
    }
}

/// Narrated ("voiceover") generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    pub tts_service: TtsService,
    pub voice_name: String,
    pub narration_style: String,
    /// Target narrated length, (min, max) seconds.
    pub target_duration_secs: (u32, u32),
    /// Extra attempts granted when narration is active.
    pub quality_retries: u32,
    /// Below-threshold narration forces regeneration.
    pub strict: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tts_service: TtsService::default(),
            voice_name: "Custom".to_string(),
            narration_style: "friendly_tutor".to_string(),
            target_duration_secs: (30, 45),
            quality_retries: 2,
            strict: true,
        }
    }
}

/// Narration quality gate thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub min_words: usize,
    pub max_words: usize,
    pub alignment_threshold: f64,
    pub educational_threshold: f64,
    pub use_llm_judge: bool,
    /// Minimum number of narration lines; 0 disables the check.
    pub min_narration_lines: usize,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            min_words: 6,
            max_words: 40,
            alignment_threshold: 0.70,
            educational_threshold: 0.70,
            use_llm_judge: true,
            min_narration_lines: 0,
        }
    }
}

/// Visible frame of the default Manim camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub frame_half_width: f64,
    pub frame_half_height: f64,
    pub fail_on_overlap: bool,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            frame_half_width: 7.1,
            frame_half_height: 4.0,
            fail_on_overlap: false,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_visualizations: usize,
    /// Base attempt budget per candidate.
    pub max_retries: u32,
    pub concurrent_analysis: bool,
    pub concurrent_generation: bool,
    pub spatial_validation: bool,
    pub render_testing: bool,
    pub failure_policy: FailurePolicy,
    pub voice: VoiceConfig,
    pub narration: NarrationConfig,
    pub spatial: SpatialConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_visualizations: 5,
            max_retries: 3,
            concurrent_analysis: true,
            concurrent_generation: true,
            spatial_validation: true,
            render_testing: true,
            failure_policy: FailurePolicy::default(),
            voice: VoiceConfig::default(),
            narration: NarrationConfig::default(),
            spatial: SpatialConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> PipelineResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| PipelineError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_retries == 0 {
            return Err(PipelineError::Config(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.max_visualizations == 0 {
            return Err(PipelineError::Config(
                "max_visualizations must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("alignment_threshold", self.narration.alignment_threshold),
            ("educational_threshold", self.narration.educational_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.spatial.frame_half_width <= 0.0 || self.spatial.frame_half_height <= 0.0 {
            return Err(PipelineError::Config(
                "frame extents must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether generation asks for narrated scenes.
    pub fn narration_active(&self) -> bool {
        self.voice.enabled
    }

    /// Total generate-then-validate cycles allowed per candidate.
    pub fn attempt_budget(&self) -> u32 {
        if self.narration_active() {
            self.max_retries + self.voice.quality_retries
        } else {
            self.max_retries
        }
    }
}
