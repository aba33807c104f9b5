//! Scale-space extrema on the DoG pyramid.
//!
//! A DoG octave is compared against its finer and coarser neighbours. For a
//! pixel `(x, y)` of octave `o`, the 3×3 neighbourhoods of octave `o - 1` and
//! `o + 1` are sampled bilinearly around the positions that map to the same
//! keyframe point, each with one-pixel steps in that octave's own grid. With
//! the pixel-centre convention `u_key = (u + 0.5)·2^o - 0.5`, the finer
//! position is `2u + 0.5` and the coarser one `u/2 - 0.25`. The first and
//! last octaves have a single scale neighbour and are compared against that
//! one only, so fine corners at full keyframe resolution are kept.
//!
//! Candidates must then pass a Laplacian magnitude test and a Hessian
//! edge-response test, and get a quadratic subpixel refinement, before they
//! become [`Keypoint`]s.

use crate::image::ImageF32;
use crate::pyramid::DogPyramid;
#[cfg(feature = "tracing")]
use tracing::instrument;

pub const LAPLACIAN_THRESHOLD: f32 = 3.0;
pub const LAPLACIAN_SQR_THRESHOLD: f32 = LAPLACIAN_THRESHOLD * LAPLACIAN_THRESHOLD;
pub const EDGE_THRESHOLD: f32 = 4.0;
pub const EDGE_HESSIAN_THRESHOLD: f32 =
    (EDGE_THRESHOLD + 1.0) * (EDGE_THRESHOLD + 1.0) / EDGE_THRESHOLD;

/// Thresholds applied to DoG extrema.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorParams {
    /// Reject candidates whose squared DoG value is below this.
    pub laplacian_sqr_threshold: f32,
    /// Reject candidates with `tr(H)² / det(H)` at or above this.
    pub edge_hessian_threshold: f32,
    /// Apply quadratic subpixel refinement.
    pub subpixel: bool,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            laplacian_sqr_threshold: LAPLACIAN_SQR_THRESHOLD,
            edge_hessian_threshold: EDGE_HESSIAN_THRESHOLD,
            subpixel: true,
        }
    }
}

/// A raw scale-space extremum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    /// Position in keyframe pixels.
    pub x: f32,
    pub y: f32,
    /// DoG sigma in keyframe pixels; encodes octave and sublevel.
    pub scale: f32,
    /// Octave the extremum was found in.
    pub octave: usize,
    /// `true` for a DoG maximum, `false` for a minimum.
    pub maxima: bool,
    /// DoG value at the integer peak.
    pub response: f32,
}

impl Keypoint {
    /// Position in the pixel grid of the keypoint's own octave.
    #[inline]
    pub fn octave_xy(&self) -> (f32, f32) {
        let f = 1.0 / (1u32 << self.octave) as f32;
        ((self.x + 0.5) * f - 0.5, (self.y + 0.5) * f - 0.5)
    }

    /// Scale expressed in the pixel grid of the keypoint's own octave.
    #[inline]
    pub fn octave_sigma(&self) -> f32 {
        self.scale / (1u32 << self.octave) as f32
    }
}

/// Find, filter and refine DoG extrema in every octave. Needs at least two
/// octaves so each one has a scale neighbour.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(pyr, params), fields(octaves = pyr.num_octaves()))
)]
pub fn detect_extrema(pyr: &DogPyramid, params: &DetectorParams) -> Vec<Keypoint> {
    let mut out = Vec::new();
    let n = pyr.num_octaves();
    if n < 2 {
        return out;
    }

    for o in 0..n {
        let finer = o.checked_sub(1).map(|f| &pyr.octaves[f].dog);
        let cur = &pyr.octaves[o].dog;
        let coarser = pyr.octaves.get(o + 1).map(|c| &c.dog);
        let sigma = pyr.octaves[o].dog_sigma();
        let step = (1u32 << o) as f32;

        if cur.w < 3 || cur.h < 3 {
            continue;
        }

        for y in 1..cur.h - 1 {
            for x in 1..cur.w - 1 {
                let v = cur.at(x, y);
                if v * v < params.laplacian_sqr_threshold {
                    continue;
                }

                let Some(maxima) = classify(cur, finer, coarser, x, y, v) else {
                    continue;
                };

                if !passes_edge_test(cur, x, y, params.edge_hessian_threshold) {
                    continue;
                }

                let (dx, dy) = if params.subpixel {
                    match subpixel_offset(cur, x, y) {
                        Some(off) => off,
                        None => continue,
                    }
                } else {
                    (0.0, 0.0)
                };

                let ox = x as f32 + dx;
                let oy = y as f32 + dy;
                out.push(Keypoint {
                    x: (ox + 0.5) * step - 0.5,
                    y: (oy + 0.5) * step - 0.5,
                    scale: sigma * step,
                    octave: o,
                    maxima,
                    response: v,
                });
            }
        }
    }

    out
}

/// `Some(true)` for a strict maximum over the 8 spatial neighbours and the
/// 3×3 patch of every available scale neighbour, `Some(false)` for a strict
/// minimum, `None` otherwise.
fn classify(
    cur: &ImageF32,
    finer: Option<&ImageF32>,
    coarser: Option<&ImageF32>,
    x: usize,
    y: usize,
    v: f32,
) -> Option<bool> {
    let mut is_max = true;
    let mut is_min = true;
    let mut check = |n: f32| {
        if n >= v {
            is_max = false;
        }
        if n <= v {
            is_min = false;
        }
    };

    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            if dx != 0 || dy != 0 {
                check(cur.at((x as isize + dx) as usize, (y as isize + dy) as usize));
            }
        }
    }

    let (fx, fy) = (2.0 * x as f32 + 0.5, 2.0 * y as f32 + 0.5);
    let (cx, cy) = (0.5 * x as f32 - 0.25, 0.5 * y as f32 - 0.25);
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if let Some(f) = finer {
                check(f.sample_bilinear(fx + dx as f32, fy + dy as f32));
            }
            if let Some(c) = coarser {
                check(c.sample_bilinear(cx + dx as f32, cy + dy as f32));
            }
        }
    }

    if is_max {
        Some(true)
    } else if is_min {
        Some(false)
    } else {
        None
    }
}

/// 2×2 spatial Hessian of the DoG plane at an interior pixel.
fn hessian(img: &ImageF32, x: usize, y: usize) -> (f32, f32, f32) {
    let v = img.at(x, y);
    let dxx = img.at(x + 1, y) + img.at(x - 1, y) - 2.0 * v;
    let dyy = img.at(x, y + 1) + img.at(x, y - 1) - 2.0 * v;
    let dxy = 0.25
        * (img.at(x + 1, y + 1) - img.at(x - 1, y + 1) - img.at(x + 1, y - 1)
            + img.at(x - 1, y - 1));
    (dxx, dyy, dxy)
}

/// Reject responses along edges: principal curvatures must be comparable.
fn passes_edge_test(img: &ImageF32, x: usize, y: usize, threshold: f32) -> bool {
    let (dxx, dyy, dxy) = hessian(img, x, y);
    let det = dxx * dyy - dxy * dxy;
    if !(det > 0.0) {
        return false;
    }
    let tr = dxx + dyy;
    tr * tr / det < threshold
}

/// Quadratic fit around the peak; the offset is clamped to half a pixel.
fn subpixel_offset(img: &ImageF32, x: usize, y: usize) -> Option<(f32, f32)> {
    let gx = 0.5 * (img.at(x + 1, y) - img.at(x - 1, y));
    let gy = 0.5 * (img.at(x, y + 1) - img.at(x, y - 1));
    let (dxx, dyy, dxy) = hessian(img, x, y);
    let det = dxx * dyy - dxy * dxy;
    if det == 0.0 {
        return None;
    }
    let ox = -(dyy * gx - dxy * gy) / det;
    let oy = -(dxx * gy - dxy * gx) / det;
    if !ox.is_finite() || !oy.is_finite() {
        return None;
    }
    Some((ox.clamp(-0.5, 0.5), oy.clamp(-0.5, 0.5)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageView;
    use crate::pyramid::{build_dog_pyramid, PyramidParams};

    fn blob_image(size: usize, cx: f32, cy: f32, sigma: f32, amp: f32) -> Vec<u8> {
        let mut data = vec![0u8; size * size];
        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let v = 40.0 + amp * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
                data[y * size + x] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
        data
    }

    #[test]
    fn edge_threshold_matches_definition() {
        assert!((EDGE_HESSIAN_THRESHOLD - 6.25).abs() < 1e-6);
        assert!((LAPLACIAN_SQR_THRESHOLD - 9.0).abs() < 1e-6);
    }

    #[test]
    fn isolated_blob_is_detected_near_its_centre() {
        let size = 96;
        let data = blob_image(size, 48.0, 48.0, 5.0, 200.0);
        let view = ImageView::from_u8_slice(size, size, &data).unwrap();
        let pyr = build_dog_pyramid(view, &PyramidParams::default());
        let kps = detect_extrema(&pyr, &DetectorParams::default());

        let near: Vec<_> = kps
            .iter()
            .filter(|k| (k.x - 48.0).hypot(k.y - 48.0) < 4.0)
            .collect();
        assert!(!near.is_empty(), "no keypoint near blob centre: {kps:?}");
        // Bright blob: the coarser plane is darker at the centre, so DoG < 0.
        assert!(near.iter().any(|k| !k.maxima));
        for k in &kps {
            assert!(k.octave < pyr.num_octaves());
            assert!(k.scale > 0.0);
            assert_eq!(pyr.octave_of_scale(k.scale), Some(k.octave));
        }
    }

    #[test]
    fn checkerboard_junction_is_found_at_full_resolution() {
        let size = 64;
        let data: Vec<u8> = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if ((x + 8) / 10 + (y + 8) / 10) % 2 == 0 {
                    200
                } else {
                    50
                }
            })
            .collect();
        let view = ImageView::from_u8_slice(size, size, &data).unwrap();
        let pyr = build_dog_pyramid(view, &PyramidParams::default());
        let kps = detect_extrema(&pyr, &DetectorParams::default());

        let best = kps
            .iter()
            .filter(|k| k.octave == 0)
            .map(|k| (k.x - 32.0).hypot(k.y - 32.0))
            .fold(f32::INFINITY, f32::min);
        assert!(best < 3.0, "nearest octave-0 keypoint is {best} px away");
        for k in &kps {
            assert_eq!(pyr.octave_of_scale(k.scale), Some(k.octave));
        }
    }

    #[test]
    fn straight_edge_is_rejected() {
        let size = 64;
        let mut data = vec![30u8; size * size];
        for y in 0..size {
            for x in size / 2..size {
                data[y * size + x] = 220;
            }
        }
        let view = ImageView::from_u8_slice(size, size, &data).unwrap();
        let pyr = build_dog_pyramid(view, &PyramidParams::default());
        let kps = detect_extrema(&pyr, &DetectorParams::default());
        assert!(kps.is_empty(), "edge produced keypoints: {kps:?}");
    }

    #[test]
    fn flat_image_has_no_extrema() {
        let data = vec![90u8; 32 * 32];
        let view = ImageView::from_u8_slice(32, 32, &data).unwrap();
        let pyr = build_dog_pyramid(view, &PyramidParams::default());
        assert!(detect_extrema(&pyr, &DetectorParams::default()).is_empty());
    }

    #[test]
    fn octave_mapping_round_trips() {
        let kp = Keypoint {
            x: 26.5,
            y: 10.5,
            scale: 2.9,
            octave: 1,
            maxima: true,
            response: 12.0,
        };
        let (ox, oy) = kp.octave_xy();
        assert!((ox - 13.0).abs() < 1e-6);
        assert!((oy - 5.0).abs() < 1e-6);
        assert!((kp.octave_sigma() - 1.45).abs() < 1e-6);
    }
}
