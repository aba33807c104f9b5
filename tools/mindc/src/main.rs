//! mindc: compile images into `.mind` target databases.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mind_compiler::app::{
    inspect_database, load_config, run_check, run_compile, CompileConfig,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mindc")]
#[command(about = "Compile grayscale target images into a .mind feature database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one or more images into a single database.
    Compile(CompileArgs),

    /// Report whether images make good targets.
    Check {
        /// Input images.
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Summarize an existing database.
    Inspect {
        /// Path to a `.mind` file.
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CompileArgs {
    /// Input images, in target order.
    images: Vec<PathBuf>,

    /// JSON config file; command-line flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output path (default: first image with a `.mind` extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a JSON summary of the compiled targets.
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Also run the target quality check.
    #[arg(long)]
    check: bool,

    /// Keypoints kept per pruning bucket.
    #[arg(long)]
    max_features_per_bucket: Option<usize>,

    /// Cluster radius in keyframe pixels.
    #[arg(long)]
    cluster_radius: Option<f32>,

    /// Minimum short side of the smallest matching keyframe.
    #[arg(long)]
    min_image_pixel_size: Option<usize>,
}

impl CompileArgs {
    fn into_config(self) -> Result<CompileConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config(path)?,
            None => CompileConfig::default(),
        };
        if !self.images.is_empty() {
            cfg.images = self.images;
        }
        if self.output.is_some() {
            cfg.output = self.output;
        }
        if self.summary_json.is_some() {
            cfg.summary_json = self.summary_json;
        }
        if self.check {
            cfg.check = Some(true);
        }
        if self.max_features_per_bucket.is_some() {
            cfg.max_features_per_bucket = self.max_features_per_bucket;
        }
        if self.cluster_radius.is_some() {
            cfg.cluster_radius = self.cluster_radius;
        }
        if self.min_image_pixel_size.is_some() {
            cfg.min_image_pixel_size = self.min_image_pixel_size;
        }
        Ok(cfg)
    }
}

fn init_tracing(level: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.unwrap_or("info"))),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile(args) => {
            let cfg = args.into_config()?;
            init_tracing(cfg.log_level.as_deref());
            compile(&cfg)
        }
        Commands::Check { images } => {
            init_tracing(None);
            check(&images)
        }
        Commands::Inspect { file } => {
            init_tracing(None);
            let summary = inspect_database(&file)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

fn compile(cfg: &CompileConfig) -> Result<()> {
    let mut last_logged = -10.0f32;
    let summary = run_compile(cfg, |p| {
        if p - last_logged >= 10.0 || p >= 100.0 {
            tracing::info!("progress {p:.0}%");
            last_logged = p;
        }
    })?;

    tracing::info!("wrote {} ({} bytes)", summary.output, summary.bytes);
    for t in &summary.targets {
        tracing::info!(
            "{}: {}x{}, {} matching points in {} keyframes, {} tracking points in {} keyframes",
            t.image.as_deref().unwrap_or("?"),
            t.width,
            t.height,
            t.matching_points,
            t.matching_keyframes,
            t.tracking_points,
            t.tracking_keyframes
        );
    }
    for (path, report) in cfg.images.iter().zip(summary.reports.iter().flatten()) {
        for issue in &report.issues {
            tracing::warn!("{}: {issue}", path.display());
        }
    }
    Ok(())
}

fn check(images: &[PathBuf]) -> Result<()> {
    let reports = run_check(images, &CompileConfig::default())?;
    let mut failed = 0usize;
    for (path, report) in images.iter().zip(&reports) {
        if report.is_acceptable() {
            tracing::info!(
                "{}: ok ({} matching features, sharpness {:.1})",
                path.display(),
                report.matching_features,
                report.sharpness
            );
        } else {
            failed += 1;
            for issue in &report.issues {
                tracing::warn!("{}: {issue}", path.display());
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} images are weak targets", images.len());
    }
    Ok(())
}
