//! ArXiviz core: turn paper sections into validated Manim scenes.
//!
//! ## Layout
//!
//! - `domain`: papers, candidates, plans, generated code, visualizations
//! - `inspect`: best-effort pattern heuristics over generated source
//! - `gate`: report types and traits for the four validation gates
//! - `structure`, `spatial`, `narration`: the offline gate implementations
//! - `agents`: collaborator traits (extractor, planner, generator)
//! - `pipeline`: the bounded generate-and-validate orchestrator
//! - `store`: persistence contract for emitted visualizations
//! - `fakes`: scripted collaborators for tests

pub mod agents;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod gate;
pub mod inspect;
pub mod narration;
pub mod obs;
pub mod pipeline;
pub mod spatial;
pub mod store;
pub mod structure;
pub mod telemetry;

pub use agents::{CandidateExtractor, CodeGenerator, GenerationOptions, PlanBuilder, SectionAnalysis};
pub use config::{
    FailurePolicy, NarrationConfig, PipelineConfig, SpatialConfig, TtsService, VoiceConfig,
};
pub use domain::{
    code_digest, new_visualization_id, rank_candidates, Candidate, GeneratedCode, Paper,
    PipelineError, PipelineResult, Plan, Scene, Section, Visualization, VisualizationKind,
    VisualizationStatus,
};
pub use gate::{
    GateKind, Gates, NarrationCheck, NarrationReport, RenderCheck, RenderErrorKind, RenderReport,
    SpatialCheck, SpatialReport, StructureCheck, StructureReport,
};
pub use narration::{JudgeScores, NarrationJudge, NarrationValidator};
pub use pipeline::{AttemptReport, Pipeline, FALLBACK_FEEDBACK};
pub use spatial::SpatialValidator;
pub use store::{MemoryVisualizationStore, VisualizationStore};
pub use structure::StructuralValidator;
