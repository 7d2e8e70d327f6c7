//! Render gate: dry-run the scene and classify what went wrong.

use std::sync::LazyLock;

use arxiviz_core::{RenderCheck, RenderErrorKind, RenderReport};
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::error::RenderError;
use crate::renderer::ManimRenderer;

/// Longest diagnostic excerpt handed back as feedback.
pub const MAX_EXCERPT_CHARS: usize = 500;

static EXCEPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:[A-Za-z_][\w]*\.)*([A-Za-z_]\w*(?:Error|Exception))(?::|\s*$)")
        .expect("static regex")
});

/// Kind of the last Python exception named in `output`.
pub fn classify_output(output: &str) -> RenderErrorKind {
    EXCEPTION_RE
        .captures_iter(output)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| RenderErrorKind::from_exception(m.as_str()))
        .unwrap_or(RenderErrorKind::Runtime)
}

/// Tail of `output`, at most [`MAX_EXCERPT_CHARS`] characters.
pub fn excerpt(output: &str) -> String {
    let trimmed = output.trim();
    let count = trimmed.chars().count();
    if count <= MAX_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - MAX_EXCERPT_CHARS).collect()
}

/// Dry-runs generated code through Manim.
#[derive(Debug, Clone)]
pub struct RenderTester {
    renderer: ManimRenderer,
}

impl RenderTester {
    pub fn new(renderer: ManimRenderer) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl RenderCheck for RenderTester {
    async fn check(&self, code: &str, scene_class_name: &str) -> RenderReport {
        match self.renderer.dry_run(code, scene_class_name).await {
            Ok(run) if run.success => RenderReport::ok(),
            Ok(run) => {
                let output = run.diagnostics();
                let kind = classify_output(output);
                debug!(scene = scene_class_name, kind = kind.as_str(), "dry run failed");
                RenderReport::failed(kind, excerpt(output))
            }
            Err(e @ RenderError::Timeout { .. }) => {
                RenderReport::failed(RenderErrorKind::Timeout, e.to_string())
            }
            Err(e @ RenderError::Spawn { .. }) => {
                RenderReport::failed(RenderErrorKind::Spawn, e.to_string())
            }
            Err(e) => RenderReport::failed(RenderErrorKind::Runtime, excerpt(&e.to_string())),
        }
    }
}
