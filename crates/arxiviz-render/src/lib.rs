//! ArXiviz rendering
//!
//! - [`ManimRenderer`]: runs the Manim CLI under a hard timeout
//! - [`RenderTester`]: the render gate, a classified dry run
//! - [`LocalVideoStorage`]: rendered videos on disk
//! - [`RenderWorker`]: renders accepted visualizations with bounded concurrency

pub mod error;
pub mod renderer;
pub mod storage;
pub mod tester;
pub mod worker;

pub use error::{RenderError, Result};
pub use renderer::{ManimRenderer, Quality, RenderRun, Renderer, RendererConfig};
pub use storage::{LocalVideoStorage, VideoStorage};
pub use tester::RenderTester;
pub use worker::{RenderSummary, RenderWorker, DEFAULT_RENDER_CONCURRENCY};
