//! Manim subprocess renderer.
//!
//! Each render gets a fresh temporary directory holding `scene.py` and the
//! media output. The child process is killed if the timeout fires.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::RenderError;
use crate::Result;

/// Render quality preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Low,
    Medium,
    High,
}

impl Quality {
    pub fn flag(&self) -> &'static str {
        match self {
            Quality::Low => "-ql",
            Quality::Medium => "-qm",
            Quality::High => "-qh",
        }
    }
}

impl std::str::FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "low_quality" => Ok(Quality::Low),
            "medium" | "medium_quality" => Ok(Quality::Medium),
            "high" | "high_quality" => Ok(Quality::High),
            other => Err(format!("unknown quality '{other}'")),
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Manim executable
    pub executable: String,
    pub quality: Quality,
    /// Hard limit for a full render
    pub render_timeout_secs: u64,
    /// Hard limit for a dry run
    pub test_timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            executable: std::env::var("MANIM_EXECUTABLE").unwrap_or_else(|_| "manim".to_string()),
            quality: Quality::Low,
            render_timeout_secs: 300,
            test_timeout_secs: 120,
        }
    }
}

impl RendererConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific executable
    pub fn new(executable: &str) -> Self {
        RendererConfig {
            executable: executable.to_string(),
            ..Self::default()
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_timeouts(mut self, render_secs: u64, test_secs: u64) -> Self {
        self.render_timeout_secs = render_secs;
        self.test_timeout_secs = test_secs;
        self
    }
}

/// Captured result of one renderer invocation.
#[derive(Debug, Clone)]
pub struct RenderRun {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub success: bool,
}

impl RenderRun {
    /// stderr, or stdout when stderr is empty.
    pub fn diagnostics(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Turns scene source into video bytes.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, code: &str, scene_class_name: &str) -> Result<Vec<u8>>;
}

/// Runs the Manim CLI.
#[derive(Debug, Clone)]
pub struct ManimRenderer {
    config: RendererConfig,
}

impl ManimRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(RendererConfig::from_env())
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Arguments passed to the executable.
    pub fn args(&self, scene_file: &Path, scene_class_name: &str, media_dir: &Path, dry_run: bool) -> Vec<String> {
        let mut args = vec![
            "render".to_string(),
            scene_file.display().to_string(),
            scene_class_name.to_string(),
            self.config.quality.flag().to_string(),
        ];
        if dry_run {
            args.push("--dry_run".to_string());
        } else {
            args.push("--format=mp4".to_string());
        }
        args.push(format!("--media_dir={}", media_dir.display()));
        args
    }

    async fn invoke(
        &self,
        workdir: &Path,
        code: &str,
        scene_class_name: &str,
        dry_run: bool,
    ) -> Result<RenderRun> {
        let start = Instant::now();
        let scene_file = workdir.join("scene.py");
        let media_dir = workdir.join("media");
        tokio::fs::write(&scene_file, code).await?;

        let timeout_secs = if dry_run {
            self.config.test_timeout_secs
        } else {
            self.config.render_timeout_secs
        };
        let args = self.args(&scene_file, scene_class_name, &media_dir, dry_run);
        debug!(executable = %self.config.executable, ?args, "starting renderer");

        let child = Command::new(&self.config.executable)
            .args(&args)
            .current_dir(workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::Spawn {
                executable: self.config.executable.clone(),
                reason: e.to_string(),
            })?;

        let output = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| RenderError::Timeout {
            scene: scene_class_name.to_string(),
            secs: timeout_secs,
        })??;

        Ok(RenderRun {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: output.status.success(),
        })
    }

    /// Parse and construct the scene without writing video.
    ///
    /// A non-zero exit is returned as an unsuccessful [`RenderRun`], not an error.
    pub async fn dry_run(&self, code: &str, scene_class_name: &str) -> Result<RenderRun> {
        let workdir = tempfile::tempdir()?;
        self.invoke(workdir.path(), code, scene_class_name, true).await
    }
}

#[async_trait]
impl Renderer for ManimRenderer {
    async fn render(&self, code: &str, scene_class_name: &str) -> Result<Vec<u8>> {
        let workdir = tempfile::tempdir()?;
        let run = self
            .invoke(workdir.path(), code, scene_class_name, false)
            .await?;
        if !run.success {
            warn!(scene = scene_class_name, exit_code = run.exit_code, "render failed");
            return Err(RenderError::Failed {
                exit_code: run.exit_code,
                output: run.diagnostics().trim().to_string(),
            });
        }

        let media_dir = workdir.path().join("media");
        let video = tokio::task::spawn_blocking(move || find_first_mp4(&media_dir))
            .await
            .map_err(|e| RenderError::Io(std::io::Error::other(e)))??
            .ok_or_else(|| RenderError::NoOutput(scene_class_name.to_string()))?;
        let bytes = tokio::fs::read(&video).await?;
        info!(
            scene = scene_class_name,
            bytes = bytes.len(),
            duration_ms = run.duration_ms,
            "render complete"
        );
        Ok(bytes)
    }
}

/// First `.mp4` under `dir`, searching depth-first in name order.
pub fn find_first_mp4(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            if let Some(found) = find_first_mp4(&path)? {
                return Ok(Some(found));
            }
        } else if path.extension().is_some_and(|ext| ext == "mp4") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
