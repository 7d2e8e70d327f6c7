//! Capacity-bounded rendering of accepted visualizations.

use std::sync::Arc;

use arxiviz_core::{Visualization, VisualizationStatus, VisualizationStore};
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

use crate::renderer::Renderer;
use crate::storage::VideoStorage;
use crate::Result;

/// Concurrent render subprocesses allowed by default.
pub const DEFAULT_RENDER_CONCURRENCY: usize = 3;

/// Outcome of a render batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// `(visualization id, video url)`
    pub completed: Vec<(String, String)>,
    /// `(visualization id, error)`
    pub failed: Vec<(String, String)>,
}

/// Renders visualizations, saves the videos and records the final status.
#[derive(Clone)]
pub struct RenderWorker {
    renderer: Arc<dyn Renderer>,
    storage: Arc<dyn VideoStorage>,
    store: Arc<dyn VisualizationStore>,
    max_concurrent: usize,
}

impl RenderWorker {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        storage: Arc<dyn VideoStorage>,
        store: Arc<dyn VisualizationStore>,
    ) -> Self {
        Self {
            renderer,
            storage,
            store,
            max_concurrent: DEFAULT_RENDER_CONCURRENCY,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Render every visualization; one failure never stops the others.
    #[instrument(skip(self, visualizations), fields(count = visualizations.len()))]
    pub async fn render_all(&self, visualizations: &[Visualization]) -> RenderSummary {
        let sem = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = Vec::with_capacity(visualizations.len());

        for viz in visualizations.iter().cloned() {
            let worker = self.clone();
            let sem = Arc::clone(&sem);
            let id = viz.id.clone();
            let handle = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                worker.render_one(&viz).await
            });
            tasks.push((id, handle));
        }

        let mut summary = RenderSummary::default();
        for (id, task) in tasks {
            match task.await {
                Ok(Ok(url)) => summary.completed.push((id, url)),
                Ok(Err(e)) => summary.failed.push((id, e.to_string())),
                Err(e) => {
                    error!(viz_id = %id, error = %e, "render task panicked");
                    if let Err(store_err) = self
                        .store
                        .update_status(&id, VisualizationStatus::Failed, None)
                        .await
                    {
                        error!(viz_id = %id, error = %store_err, "failed to record render failure");
                    }
                    summary.failed.push((id, format!("render task panicked: {e}")));
                }
            }
        }
        info!(
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            "render batch finished"
        );
        summary
    }

    async fn render_one(&self, viz: &Visualization) -> Result<String> {
        self.store
            .update_status(&viz.id, VisualizationStatus::Rendering, None)
            .await?;

        let rendered = match self.renderer.render(&viz.manim_code, &viz.scene_class_name).await {
            Ok(bytes) => self.storage.save(&viz.id, &bytes).await,
            Err(e) => Err(e),
        };

        match rendered {
            Ok(url) => {
                self.store
                    .update_status(&viz.id, VisualizationStatus::Complete, Some(url.clone()))
                    .await?;
                info!(viz_id = %viz.id, url = %url, "visualization rendered");
                Ok(url)
            }
            Err(e) => {
                error!(viz_id = %viz.id, error = %e, "visualization render failed");
                self.store
                    .update_status(&viz.id, VisualizationStatus::Failed, None)
                    .await?;
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for RenderWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderWorker")
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}
