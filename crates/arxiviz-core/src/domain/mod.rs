//! Domain models for ArXiviz.
//!
//! Canonical definitions for the entities flowing through the pipeline:
//! - `Paper` / `Section`: read-only input
//! - `Candidate`: a concept worth animating
//! - `Plan`: storyboard for one candidate
//! - `GeneratedCode`: one attempt's animation source
//! - `Visualization`: the persisted artifact

pub mod candidate;
pub mod code;
pub mod error;
pub mod paper;
pub mod plan;
pub mod visualization;

pub use candidate::{rank_candidates, Candidate, VisualizationKind};
pub use code::GeneratedCode;
pub use error::{PipelineError, PipelineResult};
pub use paper::{Paper, Section};
pub use plan::{Plan, Scene};
pub use visualization::{code_digest, new_visualization_id, Visualization, VisualizationStatus};
