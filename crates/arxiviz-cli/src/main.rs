//! ArXiviz CLI
//!
//! ## Commands
//!
//! - `generate`: run the generation pipeline over a structured paper
//! - `check`: run the offline gates (structure, spatial) over a scene file
//! - `render`: render a scene file to MP4

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use arxiviz_core::inspect::extract_scene_class_name;
use arxiviz_core::telemetry::{init_tracing, level_for};
use arxiviz_core::{
    Gates, MemoryVisualizationStore, NarrationValidator, Paper, Pipeline, PipelineConfig,
    SpatialReport, SpatialValidator, StructuralValidator, StructureReport, VisualizationStore,
};
use arxiviz_llm::{
    AnthropicClient, LlmNarrationJudge, LlmService, ManimGenerator, ProviderConfig,
    SectionAnalyzer, VisualizationPlanner,
};
use arxiviz_render::{
    LocalVideoStorage, ManimRenderer, Quality, RenderTester, RenderWorker, Renderer,
    RendererConfig,
};

#[derive(Parser)]
#[command(name = "arxiviz")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn paper sections into narrated Manim animations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate validated visualizations for a structured paper
    Generate {
        /// Paper JSON (`title`, `abstract`, `sections[{id, title, content}]`)
        #[arg(short, long)]
        paper: PathBuf,

        /// Pipeline config (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum visualizations (default: from config)
        #[arg(short, long)]
        max: Option<usize>,

        /// Write the visualizations as JSON here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Render accepted visualizations to MP4
        #[arg(long)]
        render: bool,

        /// Where rendered videos are stored
        #[arg(long, env = "MEDIA_DIR", default_value = "./media/videos")]
        media_dir: PathBuf,
    },

    /// Run the offline gates over a scene file
    Check {
        /// Scene source file
        scene: PathBuf,

        /// Pipeline config (TOML), for the frame extents
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Render a scene file to MP4
    Render {
        /// Scene source file
        scene: PathBuf,

        /// Scene class (default: detected from the source)
        #[arg(long = "scene")]
        scene_name: Option<String>,

        /// Output path (default: `<Scene>.mp4`)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// low, medium or high
        #[arg(short, long, default_value = "low")]
        quality: Quality,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs, level_for(cli.verbose));

    match cli.command {
        Commands::Generate {
            paper,
            config,
            max,
            out,
            render,
            media_dir,
        } => {
            cmd_generate(
                &paper,
                config.as_deref(),
                max,
                out.as_deref(),
                render,
                &media_dir,
            )
            .await
        }
        Commands::Check { scene, config } => cmd_check(&scene, config.as_deref()),
        Commands::Render {
            scene,
            scene_name,
            out,
            quality,
        } => cmd_render(&scene, scene_name.as_deref(), out.as_deref(), quality).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn load_paper(path: &Path) -> Result<Paper> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read paper {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid paper JSON in {}", path.display()))
}

fn build_pipeline(config: PipelineConfig, llm: Arc<dyn LlmService>) -> Pipeline {
    let mut narration = NarrationValidator::new(config.narration.clone(), config.voice.strict);
    if config.narration.use_llm_judge {
        narration = narration.with_judge(Arc::new(LlmNarrationJudge::new(llm.clone())));
    }

    let mut gates = Gates::new(Arc::new(StructuralValidator::new()))
        .with_spatial(Arc::new(SpatialValidator::new(config.spatial.clone())))
        .with_narration(Arc::new(narration));
    if config.render_testing {
        gates = gates.with_render(Arc::new(RenderTester::new(ManimRenderer::from_env())));
    }

    Pipeline::new(
        config,
        Arc::new(SectionAnalyzer::new(llm.clone())),
        Arc::new(VisualizationPlanner::new(llm.clone())),
        Arc::new(ManimGenerator::new(llm)),
        gates,
    )
}

async fn cmd_generate(
    paper_path: &Path,
    config_path: Option<&Path>,
    max: Option<usize>,
    out: Option<&Path>,
    render: bool,
    media_dir: &Path,
) -> Result<()> {
    let config = load_config(config_path)?;
    let paper = load_paper(paper_path)?;

    let provider = ProviderConfig::from_env();
    if !provider.is_configured() {
        bail!("No LLM credentials: set MARTIAN_API_KEY or ANTHROPIC_API_KEY");
    }
    info!(provider = provider.provider.as_str(), model = %provider.model, "using LLM provider");
    let llm: Arc<dyn LlmService> =
        Arc::new(AnthropicClient::new(provider).context("Failed to create LLM client")?);

    let max = max.unwrap_or(config.max_visualizations);
    let store = Arc::new(MemoryVisualizationStore::new());
    let pipeline = build_pipeline(config, llm).with_store(store.clone());

    let accepted = pipeline
        .run(&paper, max)
        .await
        .context("Visualization generation failed")?;
    info!(accepted = accepted.len(), "generation finished");

    if render && !accepted.is_empty() {
        let storage = LocalVideoStorage::new(media_dir)
            .with_context(|| format!("Failed to open media dir {}", media_dir.display()))?;
        let summary = RenderWorker::new(
            Arc::new(ManimRenderer::from_env()),
            Arc::new(storage),
            store.clone(),
        )
        .render_all(&accepted)
        .await;
        for (id, error) in &summary.failed {
            eprintln!("render failed for {id}: {error}");
        }
    }

    let visualizations = store.list().await?;
    let json = serde_json::to_string_pretty(&visualizations)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} visualization(s) to {}", visualizations.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CheckReport {
    passed: bool,
    structure: StructureReport,
    spatial: SpatialReport,
}

fn check_scene(code: &str, config: &PipelineConfig) -> CheckReport {
    let structure = StructuralValidator::new().validate(code);
    let spatial = SpatialValidator::new(config.spatial.clone()).validate(&structure.code);
    CheckReport {
        passed: !structure.blocks() && !spatial.blocks(),
        structure,
        spatial,
    }
}

fn cmd_check(scene: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let code = std::fs::read_to_string(scene)
        .with_context(|| format!("Failed to read {}", scene.display()))?;

    let report = check_scene(&code, &config);
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.passed {
        bail!("{} failed the offline checks", scene.display());
    }
    Ok(())
}

async fn cmd_render(
    scene: &Path,
    scene_name: Option<&str>,
    out: Option<&Path>,
    quality: Quality,
) -> Result<()> {
    let code = std::fs::read_to_string(scene)
        .with_context(|| format!("Failed to read {}", scene.display()))?;
    let scene_name = scene_name
        .map(str::to_string)
        .unwrap_or_else(|| extract_scene_class_name(&code));
    let out = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("{scene_name}.mp4")));

    let renderer = ManimRenderer::new(RendererConfig::from_env().with_quality(quality));
    let bytes = renderer
        .render(&code, &scene_name)
        .await
        .with_context(|| format!("Failed to render {scene_name}"))?;
    std::fs::write(&out, &bytes).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Rendered {} ({} bytes) to {}", scene_name, bytes.len(), out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"class Demo(Scene):
    def construct(self):
        self.play(ShowCreation(Square().move_to(LEFT * 2)))
"#;

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "arxiviz", "--json-logs", "generate", "--paper", "p.json", "--max", "2", "--render",
        ])
        .unwrap();
        assert!(cli.json_logs);
        match cli.command {
            Commands::Generate { paper, max, render, config, .. } => {
                assert_eq!(paper, PathBuf::from("p.json"));
                assert_eq!(max, Some(2));
                assert!(render);
                assert!(config.is_none());
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_parse_render_with_scene_and_quality() {
        let cli = Cli::try_parse_from([
            "arxiviz", "render", "scene.py", "--scene", "Demo", "-q", "high", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Render { scene_name, quality, .. } => {
                assert_eq!(scene_name.as_deref(), Some("Demo"));
                assert_eq!(quality, Quality::High);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_check_repairs_and_passes() {
        let report = check_scene(SCENE, &PipelineConfig::default());
        assert!(report.passed);
        assert!(report.structure.code.starts_with("from manim import *"));
        assert!(report.structure.code.contains("Create(Square()"));
        assert!(!report.structure.fixed.is_empty());
    }

    #[test]
    fn test_check_flags_off_screen() {
        let report = check_scene(&SCENE.replace("LEFT * 2", "LEFT * 12"), &PipelineConfig::default());
        assert!(!report.passed);
        assert_eq!(report.spatial.out_of_bounds.len(), 1);
    }

    #[test]
    fn test_config_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arxiviz.toml");
        std::fs::write(&path, "max_retries = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());

        std::fs::write(&path, "max_retries = 2\nfailure_policy = \"silent\"\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().max_retries, 2);
    }
}
