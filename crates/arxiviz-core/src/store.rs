//! Persistence contract for emitted visualizations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{PipelineError, PipelineResult, Visualization, VisualizationStatus};

/// Durable home for visualizations.
///
/// The pipeline only creates records; the render worker later moves them
/// to a terminal status.
#[async_trait]
pub trait VisualizationStore: Send + Sync {
    async fn create(&self, visualization: &Visualization) -> PipelineResult<()>;

    /// Set the status and, when given, the video URL.
    async fn update_status(
        &self,
        id: &str,
        status: VisualizationStatus,
        video_url: Option<String>,
    ) -> PipelineResult<()>;

    async fn get(&self, id: &str) -> PipelineResult<Option<Visualization>>;

    /// All records, oldest first.
    async fn list(&self) -> PipelineResult<Vec<Visualization>>;
}

/// In-memory store keyed by visualization id.
#[derive(Debug, Default)]
pub struct MemoryVisualizationStore {
    records: Mutex<HashMap<String, Visualization>>,
}

impl MemoryVisualizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> PipelineResult<std::sync::MutexGuard<'_, HashMap<String, Visualization>>> {
        self.records
            .lock()
            .map_err(|_| PipelineError::Storage("visualization store lock poisoned".to_string()))
    }
}

#[async_trait]
impl VisualizationStore for MemoryVisualizationStore {
    async fn create(&self, visualization: &Visualization) -> PipelineResult<()> {
        let mut records = self.records()?;
        if records.contains_key(&visualization.id) {
            return Err(PipelineError::Storage(format!(
                "visualization {} already exists",
                visualization.id
            )));
        }
        records.insert(visualization.id.clone(), visualization.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: VisualizationStatus,
        video_url: Option<String>,
    ) -> PipelineResult<()> {
        let mut records = self.records()?;
        let record = records
            .get_mut(id)
            .ok_or_else(|| PipelineError::Storage(format!("visualization {id} not found")))?;
        record.status = status;
        if video_url.is_some() {
            record.video_url = video_url;
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> PipelineResult<Option<Visualization>> {
        Ok(self.records()?.get(id).cloned())
    }

    async fn list(&self) -> PipelineResult<Vec<Visualization>> {
        let mut all: Vec<Visualization> = self.records()?.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Candidate, Plan, VisualizationKind};

    fn viz(id: &str) -> Visualization {
        let candidate = Candidate {
            section_id: "section-1".to_string(),
            concept_name: "Attention".to_string(),
            concept_description: String::new(),
            kind: VisualizationKind::Equation,
            priority: 1,
            context: String::new(),
        };
        let plan = Plan {
            concept_name: "Attention".to_string(),
            kind: VisualizationKind::Equation,
            duration_secs: 30.0,
            scenes: vec![],
            narration_points: vec![],
        };
        Visualization::pending(id, &candidate, &plan, "code", "Demo")
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let store = MemoryVisualizationStore::new();
        store.create(&viz("viz_a")).await.unwrap();

        let got = store.get("viz_a").await.unwrap().unwrap();
        assert_eq!(got.status, VisualizationStatus::Pending);

        store
            .update_status("viz_a", VisualizationStatus::Complete, Some("/api/video/viz_a".to_string()))
            .await
            .unwrap();
        let got = store.get("viz_a").await.unwrap().unwrap();
        assert_eq!(got.status, VisualizationStatus::Complete);
        assert_eq!(got.video_url.as_deref(), Some("/api/video/viz_a"));

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_ids_are_errors() {
        let store = MemoryVisualizationStore::new();
        store.create(&viz("viz_a")).await.unwrap();
        assert!(matches!(store.create(&viz("viz_a")).await, Err(PipelineError::Storage(_))));
        assert!(store
            .update_status("viz_b", VisualizationStatus::Failed, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_returns_all() {
        let store = MemoryVisualizationStore::new();
        store.create(&viz("viz_a")).await.unwrap();
        store.create(&viz("viz_b")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }
}
