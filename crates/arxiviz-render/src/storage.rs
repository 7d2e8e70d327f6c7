//! Video storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::RenderError;
use crate::Result;

/// Where rendered videos live and how clients reach them.
#[async_trait]
pub trait VideoStorage: Send + Sync {
    /// Store the video and return its URL.
    async fn save(&self, video_id: &str, bytes: &[u8]) -> Result<String>;

    fn path(&self, video_id: &str) -> Option<PathBuf>;

    fn url(&self, video_id: &str) -> Option<String>;

    /// Stored video ids, sorted.
    fn list(&self) -> Result<Vec<String>>;

    async fn delete(&self, video_id: &str) -> Result<bool>;
}

/// Filesystem storage: `<media_dir>/<id>.mp4`, served at `/api/video/<id>`.
#[derive(Debug, Clone)]
pub struct LocalVideoStorage {
    media_dir: PathBuf,
}

impl LocalVideoStorage {
    pub fn new(media_dir: impl Into<PathBuf>) -> Result<Self> {
        let media_dir = media_dir.into();
        std::fs::create_dir_all(&media_dir)?;
        Ok(Self { media_dir })
    }

    /// `MEDIA_DIR`, default `./media/videos`.
    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var("MEDIA_DIR").unwrap_or_else(|_| "./media/videos".to_string()))
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    fn file_for(&self, video_id: &str) -> Result<PathBuf> {
        let id = video_id.strip_suffix(".mp4").unwrap_or(video_id);
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(RenderError::Storage(format!("invalid video id '{video_id}'")));
        }
        Ok(self.media_dir.join(format!("{id}.mp4")))
    }
}

pub fn video_url(video_id: &str) -> String {
    format!("/api/video/{}", video_id.strip_suffix(".mp4").unwrap_or(video_id))
}

#[async_trait]
impl VideoStorage for LocalVideoStorage {
    async fn save(&self, video_id: &str, bytes: &[u8]) -> Result<String> {
        let path = self.file_for(video_id)?;
        tokio::fs::write(&path, bytes).await?;
        info!(video_id, bytes = bytes.len(), path = %path.display(), "video saved");
        Ok(video_url(video_id))
    }

    fn path(&self, video_id: &str) -> Option<PathBuf> {
        self.file_for(video_id).ok().filter(|p| p.is_file())
    }

    fn url(&self, video_id: &str) -> Option<String> {
        self.path(video_id).map(|_| video_url(video_id))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.media_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "mp4") {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, video_id: &str) -> Result<bool> {
        match self.path(video_id) {
            Some(path) => {
                tokio::fs::remove_file(path).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
