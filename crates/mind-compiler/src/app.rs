//! Shared application-level helpers for the CLI.
//!
//! These functions wire up I/O (load images, write the `.mind` buffer and an
//! optional JSON summary) around the compile APIs.

use anyhow::{Context, Result};
use image::ImageReader;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::Path, path::PathBuf};

use crate::compiler::CompilerParams;
use crate::database::{CompiledDatabase, TargetRecord};
use crate::export;
use crate::image::{assess_image, compile_images, gray_view};
use crate::quality::{assess_record, TargetReport};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CompileConfig {
    pub images: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub summary_json: Option<PathBuf>,
    pub log_level: Option<String>,
    pub check: Option<bool>,
    pub max_features_per_bucket: Option<usize>,
    pub cluster_radius: Option<f32>,
    pub laplacian_threshold: Option<f32>,
    pub edge_threshold: Option<f32>,
    pub template_sd_threshold: Option<f32>,
    pub min_image_pixel_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub image: Option<String>,
    pub width: u32,
    pub height: u32,
    pub matching_keyframes: usize,
    pub matching_points: usize,
    pub tracking_keyframes: usize,
    pub tracking_points: usize,
}

impl TargetSummary {
    fn from_record(image: Option<String>, t: &TargetRecord) -> Self {
        Self {
            image,
            width: t.target_image.width,
            height: t.target_image.height,
            matching_keyframes: t.matching_data.len(),
            matching_points: t.matching_data.iter().map(|m| m.num_points()).sum(),
            tracking_keyframes: t.tracking_data.len(),
            tracking_points: t.tracking_data.iter().map(|r| r.points.len()).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileSummary {
    pub output: String,
    pub bytes: usize,
    pub targets: Vec<TargetSummary>,
    pub reports: Option<Vec<TargetReport>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSummary {
    pub version: u32,
    pub targets: Vec<TargetSummary>,
}

/// Turn config overrides into compiler parameters.
pub fn build_params(cfg: &CompileConfig) -> Result<CompilerParams> {
    let mut params = CompilerParams::default();

    if let Some(v) = cfg.max_features_per_bucket {
        if v == 0 {
            anyhow::bail!("max features per bucket must be >= 1");
        }
        params.matching.prune.max_per_bucket = v;
    }
    if let Some(v) = cfg.cluster_radius {
        if v <= 0.0 {
            anyhow::bail!("cluster radius must be > 0");
        }
        params.matching.cluster.radius = v;
    }
    if let Some(v) = cfg.laplacian_threshold {
        if v < 0.0 {
            anyhow::bail!("laplacian threshold must be >= 0");
        }
        params.matching.detector.laplacian_sqr_threshold = v * v;
    }
    if let Some(v) = cfg.edge_threshold {
        if v <= 0.0 {
            anyhow::bail!("edge threshold must be > 0");
        }
        params.matching.detector.edge_hessian_threshold = (v + 1.0) * (v + 1.0) / v;
    }
    if let Some(v) = cfg.template_sd_threshold {
        params.tracking.sd_threshold = v;
    }
    if let Some(v) = cfg.min_image_pixel_size {
        if v == 0 {
            anyhow::bail!("min image pixel size must be >= 1");
        }
        params.image_list.min_image_pixel_size = v;
    }

    Ok(params)
}

/// Compile every configured image into one `.mind` file.
pub fn run_compile(cfg: &CompileConfig, on_progress: impl FnMut(f32)) -> Result<CompileSummary> {
    if cfg.images.is_empty() {
        anyhow::bail!("no input images given");
    }
    let params = build_params(cfg)?;

    let images = cfg
        .images
        .iter()
        .map(|p| load_gray(p))
        .collect::<Result<Vec<_>>>()?;

    let db = compile_images(&images, &params, on_progress).context("compiling targets")?;
    let bytes = export::encode(&db).context("encoding database")?;

    let out = cfg
        .output
        .clone()
        .unwrap_or_else(|| cfg.images[0].with_extension("mind"));
    std::fs::write(&out, &bytes).with_context(|| format!("writing {}", out.display()))?;

    let reports = if cfg.check.unwrap_or(false) {
        Some(
            images
                .iter()
                .zip(&db.data_list)
                .map(|(img, record)| gray_view(img).map(|view| assess_record(view, record)))
                .collect::<Result<Vec<_>, _>>()
                .context("assessing targets")?,
        )
    } else {
        None
    };

    let summary = CompileSummary {
        output: out.to_string_lossy().into_owned(),
        bytes: bytes.len(),
        targets: summarize(&db, Some(&cfg.images)),
        reports,
    };
    if let Some(path) = &cfg.summary_json {
        write_json(path, &summary)?;
    }
    Ok(summary)
}

/// Quality reports for images without writing a database.
pub fn run_check(paths: &[PathBuf], cfg: &CompileConfig) -> Result<Vec<TargetReport>> {
    let params = build_params(cfg)?;
    paths
        .iter()
        .map(|p| {
            let img = load_gray(p)?;
            assess_image(&img, &params).with_context(|| format!("assessing {}", p.display()))
        })
        .collect()
}

/// Decode a `.mind` file and summarize its contents.
pub fn inspect_database(path: &Path) -> Result<DatabaseSummary> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let db = export::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    Ok(DatabaseSummary {
        version: db.v,
        targets: summarize(&db, None),
    })
}

fn summarize(db: &CompiledDatabase, images: Option<&[PathBuf]>) -> Vec<TargetSummary> {
    db.data_list
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let name = images
                .and_then(|paths| paths.get(i))
                .map(|p| p.to_string_lossy().into_owned());
            TargetSummary::from_record(name, t)
        })
        .collect()
}

fn load_gray(path: &Path) -> Result<image::GrayImage> {
    let img = ImageReader::open(path)
        .with_context(|| format!("opening image {}", path.display()))?
        .decode()
        .with_context(|| format!("decoding image {}", path.display()))?;
    Ok(img.to_luma8())
}

pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let mut json_file = File::create(path)?;
    serde_json::to_writer_pretty(&mut json_file, value)?;
    json_file.write_all(b"\n")?;
    Ok(())
}

pub fn load_config(path: &Path) -> Result<CompileConfig> {
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    let cfg: CompileConfig = serde_json::from_reader(file)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_reach_the_params() {
        let cfg = CompileConfig {
            max_features_per_bucket: Some(3),
            cluster_radius: Some(12.0),
            edge_threshold: Some(4.0),
            laplacian_threshold: Some(2.0),
            min_image_pixel_size: Some(64),
            ..CompileConfig::default()
        };
        let p = build_params(&cfg).unwrap();
        assert_eq!(p.matching.prune.max_per_bucket, 3);
        assert_eq!(p.matching.cluster.radius, 12.0);
        assert!((p.matching.detector.edge_hessian_threshold - 6.25).abs() < 1e-6);
        assert_eq!(p.matching.detector.laplacian_sqr_threshold, 4.0);
        assert_eq!(p.image_list.min_image_pixel_size, 64);
    }

    #[test]
    fn invalid_overrides_are_reported() {
        let cfg = CompileConfig {
            cluster_radius: Some(0.0),
            ..CompileConfig::default()
        };
        assert!(build_params(&cfg).is_err());
        assert!(run_compile(&CompileConfig::default(), |_| {}).is_err());
    }

    #[test]
    fn config_parses_from_json() {
        let json = r#"{ "images": ["a.png", "b.jpg"], "output": "out.mind", "check": true }"#;
        let cfg: CompileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.images.len(), 2);
        assert_eq!(cfg.output, Some(PathBuf::from("out.mind")));
        assert_eq!(cfg.check, Some(true));
        assert!(cfg.summary_json.is_none());
    }

    #[test]
    fn round_trip_through_files() {
        let dir = std::env::temp_dir().join(format!("mindc-app-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let img_path = dir.join("target.png");
        let img = image::GrayImage::from_fn(64, 64, |x, y| {
            image::Luma([if ((x + 8) / 10 + (y + 8) / 10) % 2 == 0 { 200 } else { 50 }])
        });
        img.save(&img_path).unwrap();

        let cfg = CompileConfig {
            images: vec![img_path.clone()],
            summary_json: Some(dir.join("summary.json")),
            ..CompileConfig::default()
        };
        let summary = run_compile(
            &CompileConfig {
                check: Some(true),
                ..cfg.clone()
            },
            |_| {},
        )
        .unwrap();
        assert_eq!(summary.targets.len(), 1);
        let reports = summary.reports.as_ref().unwrap();
        assert_eq!(reports[0].matching_features, summary.targets[0].matching_points);
        assert_eq!(reports[0].tracking_features, summary.targets[0].tracking_points);
        assert!(dir.join("summary.json").exists());

        let inspected = inspect_database(&img_path.with_extension("mind")).unwrap();
        assert_eq!(inspected.version, 2);
        assert_eq!(inspected.targets[0].width, 64);
        assert_eq!(
            inspected.targets[0].matching_points,
            summary.targets[0].matching_points
        );
        std::fs::remove_dir_all(&dir).ok();
    }
}
