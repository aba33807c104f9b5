//! Template points for frame-to-frame tracking.
//!
//! Pixels with a locally maximal gradient strength (`dValue`) are ranked
//! through a 1000-bucket histogram; only the strongest share of the image
//! survives. Each survivor must sit on a textured patch (template standard
//! deviation at least `sd_threshold`) and must not crowd an already accepted
//! point. Window statistics come from a pair of [`CumsumTable`]s.

#[cfg(feature = "tracing")]
use tracing::{debug, instrument};

use crate::cumsum::{CumsumTable, WindowStats};
use crate::image::ImageView;

pub const TEMPLATE_SIZE: usize = 6;
pub const TEMPLATE_SD_THRESH: f32 = 5.0;
pub const MAX_POINTS_RATIO: f32 = 0.02;
pub const HISTOGRAM_BUCKETS: usize = 1000;
pub const OCCUPANCY_SIZE: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub struct TrackingParams {
    /// Nominal template size; the window spans `2 * (size / 2) + 1` pixels.
    pub template_size: usize,
    /// Minimum template standard deviation.
    pub sd_threshold: f32,
    /// Fraction of the image area the histogram walk aims for.
    pub max_points_ratio: f32,
    pub histogram_buckets: usize,
    /// Minimum Chebyshev spacing between accepted points.
    pub occupancy_size: usize,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            template_size: TEMPLATE_SIZE,
            sd_threshold: TEMPLATE_SD_THRESH,
            max_points_ratio: MAX_POINTS_RATIO,
            histogram_buckets: HISTOGRAM_BUCKETS,
            occupancy_size: OCCUPANCY_SIZE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateStats {
    pub mean: f32,
    pub sd: f32,
    pub size: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackingPoint {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub template: TemplateStats,
}

/// Per-pixel gradient strength in `[0, 1]`; border pixels are `-1`.
///
/// Horizontal and vertical central differences are summed over three
/// rows/columns and normalised by `3 * 256`.
pub fn gradient_strength(img: ImageView<'_>) -> Vec<f32> {
    let (w, h) = (img.width(), img.height());
    let mut out = vec![-1.0f32; w * h];
    if w < 3 || h < 3 {
        return out;
    }
    let p = |x: usize, y: usize| img.get(x, y) as f32;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut dx = 0.0f32;
            let mut dy = 0.0f32;
            for k in 0..3 {
                dx += p(x + 1, y + k - 1) - p(x - 1, y + k - 1);
                dy += p(x + k - 1, y + 1) - p(x + k - 1, y - 1);
            }
            dx /= 3.0 * 256.0;
            dy /= 3.0 * 256.0;
            out[y * w + x] = ((dx * dx + dy * dy) * 0.5).sqrt();
        }
    }
    out
}

#[inline]
fn bucket(d: f32, buckets: usize) -> usize {
    ((d * buckets as f32) as usize).min(buckets - 1)
}

/// Lowest histogram bucket that still belongs to the strongest
/// `max_points` candidates. Buckets are walked from the top until the
/// running count exceeds the limit; the bucket that crosses it is kept.
fn threshold_bucket(hist: &[usize], max_points: f32) -> usize {
    let mut count = 0usize;
    for k in (0..hist.len()).rev() {
        count += hist[k];
        if count as f32 > max_points {
            return k;
        }
    }
    0
}

/// Spatial hash of accepted points with `cell` sized bins.
struct Occupancy {
    cell: usize,
    cols: usize,
    rows: usize,
    bins: Vec<Vec<(usize, usize)>>,
}

impl Occupancy {
    fn new(w: usize, h: usize, cell: usize) -> Self {
        let cell = cell.max(1);
        let cols = w.div_ceil(cell);
        let rows = h.div_ceil(cell);
        Self {
            cell,
            cols,
            rows,
            bins: vec![Vec::new(); cols * rows],
        }
    }

    fn is_occupied(&self, x: usize, y: usize) -> bool {
        let (cx, cy) = (x / self.cell, y / self.cell);
        for row in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
            for col in cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1) {
                let hit = self.bins[row * self.cols + col]
                    .iter()
                    .any(|&(px, py)| px.abs_diff(x) < self.cell && py.abs_diff(y) < self.cell);
                if hit {
                    return true;
                }
            }
        }
        false
    }

    fn mark(&mut self, x: usize, y: usize) {
        let idx = (y / self.cell) * self.cols + x / self.cell;
        self.bins[idx].push((x, y));
    }
}

/// Extract tracking points from one keyframe, returned in raster order.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(w = img.width(), h = img.height()))
)]
pub fn extract_tracking_features(img: ImageView<'_>, params: &TrackingParams) -> Vec<TrackingPoint> {
    let (w, h) = (img.width(), img.height());
    let buckets = params.histogram_buckets.max(1);
    let d = gradient_strength(img);

    // Strict 4-neighbour maxima of the gradient strength.
    let mut candidates: Vec<usize> = Vec::new();
    let mut hist = vec![0usize; buckets];
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let i = y * w + x;
            let v = d[i];
            if v > 0.0 && v > d[i - 1] && v > d[i + 1] && v > d[i - w] && v > d[i + w] {
                candidates.push(i);
                hist[bucket(v, buckets)] += 1;
            }
        }
    }
    if candidates.is_empty() {
        return Vec::new();
    }

    let max_points = params.max_points_ratio * (w * h) as f32;
    let k = threshold_bucket(&hist, max_points);
    candidates.retain(|&i| bucket(d[i], buckets) >= k);
    // Stable: equal strengths stay in raster order.
    candidates.sort_by(|&a, &b| d[b].total_cmp(&d[a]));

    let sum = CumsumTable::new(w, h, img.data());
    let sqr = CumsumTable::squared(w, h, img.data());
    let half = params.template_size / 2;
    let mut occupancy = Occupancy::new(w, h, params.occupancy_size);
    let mut out = Vec::new();

    for i in candidates {
        let (x, y) = (i % w, i / w);
        if occupancy.is_occupied(x, y) {
            continue;
        }
        let (Some(x0), Some(y0)) = (x.checked_sub(half), y.checked_sub(half)) else {
            continue;
        };
        let Some(stats) = WindowStats::from_tables(&sum, &sqr, x0, y0, x + half, y + half) else {
            continue;
        };
        if (stats.sd as f32) < params.sd_threshold {
            continue;
        }

        occupancy.mark(x, y);
        out.push(TrackingPoint {
            x: x as f32,
            y: y as f32,
            scale: 1.0,
            template: TemplateStats {
                mean: stats.mean as f32,
                sd: stats.sd as f32,
                size: params.template_size,
            },
        });
    }

    out.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    #[cfg(feature = "tracing")]
    debug!(threshold_bucket = k, points = out.len(), "tracking features");

    out
}
