//! Manim code generator.
//!
//! Produces a complete scene for a plan, optionally narrated with
//! `manim_voiceover`. The speech service setup line is fixed per TTS
//! service so the structural and narration gates see a predictable shape.

use std::sync::Arc;

use arxiviz_core::inspect::{ensure_manim_import, scene_class_name_for};
use arxiviz_core::{
    CodeGenerator, GeneratedCode, GenerationOptions, PipelineError, PipelineResult, Plan,
    TtsService,
};
use async_trait::async_trait;
use tracing::debug;

use crate::client::LlmService;
use crate::extract::extract_code_block;
use crate::prompts;

/// ElevenLabs voice names and their ids.
pub const ELEVENLABS_VOICES: &[(&str, &str)] = &[
    ("Custom", "2fe8mwpfJcqvj9RGBsC1"),
    ("Adam", "pNInz6obpgDQGcFmaJgB"),
    ("Antoni", "ErXwobaYiN019PkySvjV"),
    ("Arnold", "VR6AewLTigWG4xSOukaG"),
    ("Bella", "EXAVITQu4vr4xnSDxMaL"),
    ("Domi", "AZnzlk1XvdvUeBnXmlld"),
    ("Elli", "MF3mGyEYCl7XYWbV9V6O"),
    ("Josh", "TxGEqnHWrfWFTfGW9XjX"),
    ("Rachel", "21m00Tcm4TlvDq8ikWAM"),
    ("Sam", "yoZ06aMxZJJ28mfd3POQ"),
];

const DEFAULT_ELEVENLABS_VOICE: &str = "Adam";

/// Voice id for a name; unknown names get Adam.
pub fn elevenlabs_voice_id(name: &str) -> &'static str {
    let lookup = |wanted: &str| {
        ELEVENLABS_VOICES
            .iter()
            .find(|(voice, _)| voice.eq_ignore_ascii_case(wanted))
            .map(|(_, id)| *id)
    };
    lookup(name)
        .or_else(|| lookup(DEFAULT_ELEVENLABS_VOICE))
        .unwrap_or_default()
}

/// Import line for a speech service.
pub fn tts_import(service: TtsService) -> &'static str {
    match service {
        TtsService::Gtts => "from manim_voiceover.services.gtts import GTTSService",
        TtsService::Azure => "from manim_voiceover.services.azure import AzureService",
        TtsService::Elevenlabs => {
            "from manim_voiceover.services.elevenlabs import ElevenLabsService"
        }
        TtsService::Recorder => "from manim_voiceover.services.recorder import RecorderService",
    }
}

/// `set_speech_service(...)` line for a speech service.
pub fn tts_setup(service: TtsService, voice_name: &str) -> String {
    match service {
        TtsService::Gtts => "self.set_speech_service(GTTSService())".to_string(),
        TtsService::Azure => {
            "self.set_speech_service(AzureService(voice=\"en-US-AriaNeural\"))".to_string()
        }
        TtsService::Elevenlabs => format!(
            "self.set_speech_service(ElevenLabsService(voice_id=\"{}\", \
             model=\"eleven_flash_v2_5\", transcription_model=None))",
            elevenlabs_voice_id(voice_name)
        ),
        TtsService::Recorder => "self.set_speech_service(RecorderService())".to_string(),
    }
}

/// Code block of a response with the Manim import guaranteed.
pub fn clean_code(response: &str) -> String {
    let code = extract_code_block(response);
    let (code, _) = ensure_manim_import(&code);
    code.trim().to_string()
}

/// Writes Manim scenes with the language model.
pub struct ManimGenerator {
    llm: Arc<dyn LlmService>,
    max_tokens: u32,
}

impl ManimGenerator {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            max_tokens: 8192,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn prompt(plan: &Plan, options: &GenerationOptions) -> String {
        let plan_json = serde_json::to_string_pretty(plan).unwrap_or_default();
        let scene_class_name = scene_class_name_for(&plan.concept_name);
        let mode = if options.narration {
            let setup = tts_setup(options.tts_service, &options.voice_name);
            let (min_secs, max_secs) = options.target_duration_secs;
            prompts::render(
                prompts::VOICEOVER_MODE,
                &[
                    ("tts_import", tts_import(options.tts_service)),
                    ("tts_setup", &setup),
                    ("narration_style", &options.narration_style),
                    ("min_secs", &min_secs.to_string()),
                    ("max_secs", &max_secs.to_string()),
                ],
            )
        } else {
            prompts::SILENT_MODE.to_string()
        };
        prompts::render(
            prompts::GENERATOR,
            &[
                ("plan_json", &plan_json),
                ("scene_class_name", &scene_class_name),
                ("mode_instructions", &mode),
            ],
        )
    }

    async fn request(
        &self,
        plan: &Plan,
        prompt: &str,
        options: &GenerationOptions,
    ) -> PipelineResult<GeneratedCode> {
        let response = self
            .llm
            .complete(prompts::SYSTEM, prompt, self.max_tokens)
            .await?;
        let code = clean_code(&response);
        if !code.lines().any(|l| l.trim_start().starts_with("class ")) {
            return Err(PipelineError::Parse(format!(
                "no scene class in generated code for '{}'",
                plan.concept_name
            )));
        }
        let generated = GeneratedCode::from_source(code, options.narration);
        debug!(
            concept = %plan.concept_name,
            scene = %generated.scene_class_name,
            narration_lines = generated.narration_lines.len(),
            "code generated"
        );
        Ok(generated)
    }
}

#[async_trait]
impl CodeGenerator for ManimGenerator {
    async fn generate(
        &self,
        plan: &Plan,
        options: &GenerationOptions,
    ) -> PipelineResult<GeneratedCode> {
        let prompt = Self::prompt(plan, options);
        self.request(plan, &prompt, options).await
    }

    async fn generate_with_feedback(
        &self,
        plan: &Plan,
        previous_code: &str,
        feedback: &str,
        options: &GenerationOptions,
    ) -> PipelineResult<GeneratedCode> {
        let mut prompt = Self::prompt(plan, options);
        prompt.push_str(&prompts::render(
            prompts::FEEDBACK,
            &[("previous_code", previous_code), ("feedback", feedback)],
        ));
        self.request(plan, &prompt, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedLlm;
    use arxiviz_core::{Scene, VisualizationKind, VoiceConfig};

    fn plan() -> Plan {
        Plan {
            concept_name: "Positional Encoding".to_string(),
            kind: VisualizationKind::Equation,
            duration_secs: 30.0,
            scenes: vec![Scene {
                order: 1,
                description: "Sine waves per dimension".to_string(),
                duration_secs: 30.0,
                transitions: String::new(),
                elements: vec!["Axes".to_string()],
            }],
            narration_points: vec![],
        }
    }

    const NARRATED: &str = r#"Here is the scene:
```python
from manim_voiceover import VoiceoverScene
from manim_voiceover.services.gtts import GTTSService

class PositionalEncodingScene(VoiceoverScene):
    def construct(self):
        self.set_speech_service(GTTSService())
        # Beat 1: waves
        with self.voiceover(text="Every position gets its own mix of sine waves.") as tracker:
            self.play(Create(Axes()), run_time=tracker.duration)
```
"#;

    #[test]
    fn test_voice_lookup_defaults_to_adam() {
        assert_eq!(elevenlabs_voice_id("Custom"), "2fe8mwpfJcqvj9RGBsC1");
        assert_eq!(elevenlabs_voice_id("rachel"), "21m00Tcm4TlvDq8ikWAM");
        assert_eq!(elevenlabs_voice_id("Nobody"), "pNInz6obpgDQGcFmaJgB");
        assert!(tts_setup(TtsService::Elevenlabs, "Nobody").contains("pNInz6obpgDQGcFmaJgB"));
    }

    #[test]
    fn test_clean_code_adds_import() {
        let code = clean_code("```python\nclass A(Scene):\n    pass\n```");
        assert!(code.starts_with("from manim import *"));
        assert!(code.ends_with("pass"));
    }

    #[tokio::test]
    async fn test_generate_derives_metadata() {
        let llm = ScriptedLlm::new().reply(NARRATED);
        let options = GenerationOptions::from(&VoiceConfig {
            tts_service: TtsService::Gtts,
            ..VoiceConfig::default()
        });
        let generated = ManimGenerator::new(Arc::new(llm.clone()))
            .generate(&plan(), &options)
            .await
            .unwrap();

        assert!(generated.code.starts_with("from manim import *"));
        assert_eq!(generated.scene_class_name, "PositionalEncodingScene");
        assert_eq!(generated.dependencies, vec!["manim", "manim_voiceover"]);
        assert_eq!(
            generated.narration_lines,
            vec!["Every position gets its own mix of sine waves."]
        );
        assert_eq!(generated.narration_beats, vec!["# Beat 1: waves"]);

        let request = &llm.requests()[0];
        assert_eq!(request.max_tokens, 8192);
        assert!(request.prompt.contains("Name the class `PositionalEncoding`."));
        assert!(request.prompt.contains("self.set_speech_service(GTTSService())"));
    }

    #[tokio::test]
    async fn test_feedback_prompt_carries_previous_attempt() {
        let llm = ScriptedLlm::new().reply(NARRATED);
        let generator = ManimGenerator::new(Arc::new(llm.clone()));
        generator
            .generate_with_feedback(
                &plan(),
                "class Broken(Scene): pass",
                "SPATIAL ISSUES:\n- line 4: off screen\n",
                &GenerationOptions::silent(),
            )
            .await
            .unwrap();

        let prompt = &llm.requests()[0].prompt;
        assert!(prompt.contains("## Previous Attempt Failed!"));
        assert!(prompt.contains("class Broken(Scene): pass"));
        assert!(prompt.contains("- line 4: off screen"));
        assert!(prompt.contains("Subclass `Scene`"));
    }

    #[tokio::test]
    async fn test_response_without_class_is_parse_error() {
        let llm = ScriptedLlm::new().reply("Sorry, I can't write that.");
        let err = ManimGenerator::new(Arc::new(llm))
            .generate(&plan(), &GenerationOptions::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }
}
