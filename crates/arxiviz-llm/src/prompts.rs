//! Prompt templates.
//!
//! Placeholders are `{name}` and are substituted with plain string
//! replacement, so payloads containing braces (LaTeX, JSON) pass through
//! untouched.

/// Shared system instruction for every Manim-facing call.
pub const SYSTEM: &str = "You are an expert in Manim Community Edition and in explaining \
machine learning papers visually. Use only the Manim CE API (Create, Text, MathTex, FadeIn). \
Keep every object inside the visible frame (x in [-7, 7], y in [-4, 4]). Never touch the \
filesystem, network or subprocesses.";

pub const ANALYZER: &str = r#"Paper: {paper_title}
Abstract: {paper_abstract}

Section "{section_title}":
{section_content}

Decide whether this section contains concepts that benefit from a short animation.
Return JSON only:
{{"needs_visualization": bool,
  "reasoning": "...",
  "candidates": [{{"concept_name": "...", "concept_description": "...",
                  "visualization_type": "equation|architecture|data_flow|algorithm|matrix|3d",
                  "priority": 1-5, "context": "quote the relevant sentences"}}]}}"#;

pub const PLANNER: &str = r#"Concept: {concept_name} ({visualization_type})
Description: {concept_description}

Section content:
{section_content}

Paper context:
{paper_context}

Storyboard a 30-60 second animation. Return JSON only:
{{"concept_name": "{concept_name}", "visualization_type": "{visualization_type}",
  "duration_seconds": number,
  "scenes": [{{"order": 1, "description": "...", "duration_seconds": number,
              "transitions": "...", "elements": ["..."]}}],
  "narration_points": ["..."]}}"#;

pub const GENERATOR: &str = r#"Write a complete Manim scene for this storyboard.

Storyboard:
{plan_json}

Name the class `{scene_class_name}`.
{mode_instructions}
Return a single ```python fenced block."#;

pub const SILENT_MODE: &str = "Subclass `Scene`. Do not add narration.";

pub const VOICEOVER_MODE: &str = r#"Subclass `VoiceoverScene` and narrate it.
Required imports:
from manim import *
from manim_voiceover import VoiceoverScene
{tts_import}

First line of construct(self):
        {tts_setup}

Mark every beat with a `# Beat N: ...` comment and wrap its animations in
`with self.voiceover(text="...") as tracker:` using `run_time=tracker.duration`.
Narration style: {narration_style}. Total length {min_secs}-{max_secs} seconds.
Each narration line teaches the idea in plain language; never describe the
animation itself ("Show...", "Fade in...")."#;

pub const FEEDBACK: &str = r#"

## Previous Attempt Failed!

Previous code:
```python
{previous_code}
```

Problems found:
{feedback}

Fix every problem above and return the full corrected scene."#;

/// Collapse `{{`/`}}` escapes in the template, then substitute `{key}`
/// placeholders. Values are inserted verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.replace("{{", "{").replace("}}", "}");
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}
