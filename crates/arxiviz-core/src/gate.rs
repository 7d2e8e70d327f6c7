//! Gate contracts for the validation loop.
//!
//! Each gate produces a plain report value. The orchestrator only looks at
//! [`blocks`](StructureReport::blocks) and [`feedback`](StructureReport::feedback),
//! so tests can drive the loop by constructing reports directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Candidate, GeneratedCode, Plan};

/// The four gates, in the order they run within an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Structure,
    Spatial,
    Narration,
    Render,
}

impl GateKind {
    pub const ORDER: [GateKind; 4] = [
        GateKind::Structure,
        GateKind::Spatial,
        GateKind::Narration,
        GateKind::Render,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Spatial => "spatial",
            Self::Narration => "narration",
            Self::Render => "render",
        }
    }
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn labelled_block(header: &str, lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let mut out = String::from(header);
    out.push('\n');
    for line in lines {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
    Some(out)
}

/// Output of the structural gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureReport {
    pub valid: bool,
    /// Possibly rewritten code; canonical from here on.
    pub code: String,
    /// Non-fixable issues.
    pub issues: Vec<String>,
    /// Issues repaired in place.
    pub fixed: Vec<String>,
}

impl StructureReport {
    pub fn pass(code: impl Into<String>) -> Self {
        Self {
            valid: true,
            code: code.into(),
            issues: Vec::new(),
            fixed: Vec::new(),
        }
    }

    pub fn fail(code: impl Into<String>, issues: Vec<String>) -> Self {
        Self {
            valid: false,
            code: code.into(),
            issues,
            fixed: Vec::new(),
        }
    }

    pub fn blocks(&self) -> bool {
        !self.valid
    }

    pub fn feedback(&self) -> Option<String> {
        labelled_block("SYNTAX / STRUCTURE ISSUES:", &self.issues)
    }
}

/// Output of the spatial gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReport {
    pub out_of_bounds: Vec<String>,
    pub overlaps: Vec<String>,
    pub needs_regeneration: bool,
}

impl SpatialReport {
    pub fn blocks(&self) -> bool {
        self.needs_regeneration
    }

    pub fn issues(&self) -> Vec<String> {
        self.out_of_bounds
            .iter()
            .chain(self.overlaps.iter())
            .cloned()
            .collect()
    }

    pub fn feedback(&self) -> Option<String> {
        labelled_block("SPATIAL ISSUES:", &self.issues())
    }
}

/// Output of the narration quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub score_alignment: f64,
    pub score_educational: f64,
    pub needs_regeneration: bool,
}

impl NarrationReport {
    pub fn pass(score_alignment: f64, score_educational: f64) -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
            score_alignment,
            score_educational,
            needs_regeneration: false,
        }
    }

    pub fn reject(issues: Vec<String>) -> Self {
        Self {
            valid: false,
            issues,
            score_alignment: 0.0,
            score_educational: 0.0,
            needs_regeneration: true,
        }
    }

    pub fn blocks(&self) -> bool {
        self.needs_regeneration
    }

    pub fn feedback(&self) -> Option<String> {
        let header = format!(
            "NARRATION QUALITY ISSUES (alignment {:.2}, educational {:.2}):",
            self.score_alignment, self.score_educational
        );
        labelled_block(&header, &self.issues)
    }
}

/// Classification of a failed test render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderErrorKind {
    Syntax,
    Import,
    Name,
    Attribute,
    Type,
    Value,
    Timeout,
    Spawn,
    Runtime,
}

impl RenderErrorKind {
    /// Map a Python exception class name to a kind.
    pub fn from_exception(name: &str) -> Self {
        match name {
            "SyntaxError" | "IndentationError" | "TabError" => Self::Syntax,
            "ImportError" | "ModuleNotFoundError" => Self::Import,
            "NameError" | "UnboundLocalError" => Self::Name,
            "AttributeError" => Self::Attribute,
            "TypeError" => Self::Type,
            "ValueError" | "IndexError" | "KeyError" => Self::Value,
            _ => Self::Runtime,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Import => "import",
            Self::Name => "name",
            Self::Attribute => "attribute",
            Self::Type => "type",
            Self::Value => "value",
            Self::Timeout => "timeout",
            Self::Spawn => "spawn",
            Self::Runtime => "runtime",
        }
    }
}

/// Output of the render test gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderReport {
    pub success: bool,
    pub error_kind: Option<RenderErrorKind>,
    pub message: String,
}

impl RenderReport {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_kind: None,
            message: String::new(),
        }
    }

    pub fn failed(kind: RenderErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_kind: Some(kind),
            message: message.into(),
        }
    }

    pub fn blocks(&self) -> bool {
        !self.success
    }

    pub fn feedback(&self) -> Option<String> {
        if self.success {
            return None;
        }
        let kind = self.error_kind.unwrap_or(RenderErrorKind::Runtime);
        Some(format!(
            "RENDER TEST FAILED ({} error):\n{}\n",
            kind.as_str(),
            self.message.trim()
        ))
    }
}

/// Structural gate: may rewrite code.
pub trait StructureCheck: Send + Sync {
    fn check(&self, code: &str) -> StructureReport;
}

/// Spatial gate.
pub trait SpatialCheck: Send + Sync {
    fn check(&self, code: &str) -> SpatialReport;
}

/// Narration quality gate.
#[async_trait]
pub trait NarrationCheck: Send + Sync {
    async fn check(&self, code: &GeneratedCode, plan: &Plan, candidate: &Candidate)
        -> NarrationReport;
}

/// Render test gate.
#[async_trait]
pub trait RenderCheck: Send + Sync {
    async fn check(&self, code: &str, scene_class_name: &str) -> RenderReport;
}

/// The gates a pipeline runs. Structure is mandatory; the rest are optional.
#[derive(Clone)]
pub struct Gates {
    pub structure: Arc<dyn StructureCheck>,
    pub spatial: Option<Arc<dyn SpatialCheck>>,
    pub narration: Option<Arc<dyn NarrationCheck>>,
    pub render: Option<Arc<dyn RenderCheck>>,
}

impl Gates {
    pub fn new(structure: Arc<dyn StructureCheck>) -> Self {
        Self {
            structure,
            spatial: None,
            narration: None,
            render: None,
        }
    }

    pub fn with_spatial(mut self, gate: Arc<dyn SpatialCheck>) -> Self {
        self.spatial = Some(gate);
        self
    }

    pub fn with_narration(mut self, gate: Arc<dyn NarrationCheck>) -> Self {
        self.narration = Some(gate);
        self
    }

    pub fn with_render(mut self, gate: Arc<dyn RenderCheck>) -> Self {
        self.render = Some(gate);
        self
    }
}

impl std::fmt::Debug for Gates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gates")
            .field("spatial", &self.spatial.is_some())
            .field("narration", &self.narration.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_feedback_lists_issues() {
        let report = StructureReport::fail("x", vec!["line 3: unmatched ')'".to_string()]);
        assert!(report.blocks());
        let fb = report.feedback().unwrap();
        assert!(fb.starts_with("SYNTAX / STRUCTURE ISSUES:\n"));
        assert!(fb.contains("- line 3: unmatched ')'"));

        assert!(StructureReport::pass("x").feedback().is_none());
    }

    #[test]
    fn test_spatial_overlap_warning_does_not_block_by_itself() {
        let report = SpatialReport {
            out_of_bounds: vec![],
            overlaps: vec!["two objects at (0, 0)".to_string()],
            needs_regeneration: false,
        };
        assert!(!report.blocks());
        assert!(report.feedback().unwrap().contains("two objects at (0, 0)"));
    }

    #[test]
    fn test_render_feedback_includes_kind() {
        let report = RenderReport::failed(RenderErrorKind::Attribute, "AttributeError: no 'foo'");
        assert!(report.blocks());
        assert!(report.feedback().unwrap().contains("attribute error"));
        assert!(RenderReport::ok().feedback().is_none());
    }

    #[test]
    fn test_exception_classification() {
        assert_eq!(RenderErrorKind::from_exception("ModuleNotFoundError"), RenderErrorKind::Import);
        assert_eq!(RenderErrorKind::from_exception("IndentationError"), RenderErrorKind::Syntax);
        assert_eq!(RenderErrorKind::from_exception("ZeroDivisionError"), RenderErrorKind::Runtime);
    }

    #[test]
    fn test_gate_order() {
        assert_eq!(GateKind::ORDER[0], GateKind::Structure);
        assert_eq!(GateKind::ORDER[3], GateKind::Render);
        assert_eq!(GateKind::Narration.to_string(), "narration");
    }
}
