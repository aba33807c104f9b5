//! Suitability report for a candidate target image.
//!
//! Counts the features the compiler would extract and measures sharpness as
//! the variance of the 4-neighbour Laplacian. Thin, blurry or featureless
//! targets track poorly and are flagged.

use mind_core::ImageView;
use serde::Serialize;

use crate::compiler::{CompileJob, CompilerParams};
use crate::database::TargetRecord;
use crate::error::CompileError;

pub const MIN_MATCHING_FEATURES: usize = 50;
pub const MIN_SHARPNESS: f64 = 100.0;
pub const MIN_TARGET_DIMENSION: usize = 200;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityIssue {
    TooFewFeatures { found: usize, required: usize },
    Blurry { sharpness: f64, required: f64 },
    TooSmall { width: usize, height: usize, required: usize },
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewFeatures { found, required } => {
                write!(f, "only {found} matching features (want at least {required})")
            }
            Self::Blurry {
                sharpness,
                required,
            } => write!(f, "sharpness {sharpness:.1} is below {required:.1}"),
            Self::TooSmall {
                width,
                height,
                required,
            } => write!(f, "{width}x{height} is smaller than {required} px on a side"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TargetReport {
    pub width: usize,
    pub height: usize,
    /// Matching features over all matching keyframes.
    pub matching_features: usize,
    /// Tracking points over all tracking keyframes.
    pub tracking_features: usize,
    pub sharpness: f64,
    pub issues: Vec<QualityIssue>,
}

impl TargetReport {
    #[inline]
    pub fn is_acceptable(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Variance of the 4-neighbour Laplacian over interior pixels.
pub fn laplacian_variance(img: ImageView<'_>) -> f64 {
    let (w, h) = (img.width(), img.height());
    if w < 3 || h < 3 {
        return 0.0;
    }
    let mut sum = 0.0f64;
    let mut sum2 = 0.0f64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let l = img.get(x - 1, y) as f64
                + img.get(x + 1, y) as f64
                + img.get(x, y - 1) as f64
                + img.get(x, y + 1) as f64
                - 4.0 * img.get(x, y) as f64;
            sum += l;
            sum2 += l * l;
        }
    }
    let n = ((w - 2) * (h - 2)) as f64;
    let mean = sum / n;
    (sum2 / n - mean * mean).max(0.0)
}

/// Compile `img` alone and summarize what came out.
pub fn assess_target(img: ImageView<'_>, params: &CompilerParams) -> Result<TargetReport, CompileError> {
    let mut job = CompileJob::new(&[img], params);
    let db = job.run(|_| {})?;
    Ok(match db.data_list.first() {
        Some(record) => assess_record(img, record),
        None => report(img, 0, 0),
    })
}

/// Summarize an already compiled target without compiling it again.
pub fn assess_record(img: ImageView<'_>, record: &TargetRecord) -> TargetReport {
    report(
        img,
        record.matching_data.iter().map(|m| m.num_points()).sum(),
        record.tracking_data.iter().map(|r| r.points.len()).sum(),
    )
}

fn report(img: ImageView<'_>, matching_features: usize, tracking_features: usize) -> TargetReport {
    let sharpness = laplacian_variance(img);

    let mut issues = Vec::new();
    if matching_features < MIN_MATCHING_FEATURES {
        issues.push(QualityIssue::TooFewFeatures {
            found: matching_features,
            required: MIN_MATCHING_FEATURES,
        });
    }
    if sharpness < MIN_SHARPNESS {
        issues.push(QualityIssue::Blurry {
            sharpness,
            required: MIN_SHARPNESS,
        });
    }
    if img.width() < MIN_TARGET_DIMENSION || img.height() < MIN_TARGET_DIMENSION {
        issues.push(QualityIssue::TooSmall {
            width: img.width(),
            height: img.height(),
            required: MIN_TARGET_DIMENSION,
        });
    }

    TargetReport {
        width: img.width(),
        height: img.height(),
        matching_features,
        tracking_features,
        sharpness,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laplacian_of_flat_and_ramp_is_zero() {
        let flat = vec![77u8; 100];
        let view = ImageView::from_u8_slice(10, 10, &flat).unwrap();
        assert_eq!(laplacian_variance(view), 0.0);

        let ramp: Vec<u8> = (0..100).map(|i| (i % 10 * 7) as u8).collect();
        let view = ImageView::from_u8_slice(10, 10, &ramp).unwrap();
        assert!(laplacian_variance(view).abs() < 1e-9);
    }

    #[test]
    fn pixel_checkerboard_is_sharp() {
        let data: Vec<u8> = (0..64 * 64)
            .map(|i| if (i % 64 + i / 64) % 2 == 0 { 200 } else { 40 })
            .collect();
        let view = ImageView::from_u8_slice(64, 64, &data).unwrap();
        // |L| = 4 * 160 everywhere with alternating sign.
        approx::assert_relative_eq!(laplacian_variance(view), 640.0 * 640.0, epsilon = 1e-6);
        assert!(laplacian_variance(view) > MIN_SHARPNESS);
    }

    #[test]
    fn flat_small_target_collects_every_issue() {
        let data = vec![128u8; 48 * 48];
        let view = ImageView::from_u8_slice(48, 48, &data).unwrap();
        let report = assess_target(view, &CompilerParams::default()).unwrap();
        assert_eq!(report.matching_features, 0);
        assert_eq!(report.tracking_features, 0);
        assert!(!report.is_acceptable());
        assert_eq!(report.issues.len(), 3);
        assert!(matches!(report.issues[0], QualityIssue::TooFewFeatures { found: 0, .. }));
        assert!(matches!(report.issues[1], QualityIssue::Blurry { .. }));
        assert!(matches!(report.issues[2], QualityIssue::TooSmall { .. }));
    }

    #[test]
    fn compiled_record_gives_the_same_report() {
        let data: Vec<u8> = (0..80 * 80)
            .map(|i| (((i % 80) * 3) ^ ((i / 80) * 5)) as u8)
            .collect();
        let view = ImageView::from_u8_slice(80, 80, &data).unwrap();
        let params = CompilerParams::default();

        let db = crate::Compiler::new(params.clone()).compile(&[view], |_| {}).unwrap();
        let from_record = assess_record(view, &db.data_list[0]);
        assert_eq!(from_record, assess_target(view, &params).unwrap());
        assert_eq!(from_record.width, 80);
    }
}
