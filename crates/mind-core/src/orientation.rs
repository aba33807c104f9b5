//! Dominant gradient orientation per keypoint.
//!
//! Gradients inside a disc around the keypoint (in its octave's `image1`) are
//! accumulated into a 36-bin histogram with Gaussian weighting, smoothed with
//! a circular `[1, 2, 1] / 4` kernel and reduced to the centre angle of the
//! strongest bin. On exact ties the lowest bin index wins.

use crate::extrema::Keypoint;
use crate::image::ImageF32;
use crate::pyramid::DogPyramid;

pub const ORIENTATION_NUM_BINS: usize = 36;
pub const ORIENTATION_SMOOTHING_ITERATIONS: usize = 5;
pub const ORIENTATION_GAUSSIAN_EXPANSION_FACTOR: f32 = 3.0;
pub const ORIENTATION_REGION_EXPANSION_FACTOR: f32 = 1.5;

const BIN_DEGREES: f32 = 360.0 / ORIENTATION_NUM_BINS as f32;

pub type OrientationHistogram = [f32; ORIENTATION_NUM_BINS];

#[derive(Clone, Debug, PartialEq)]
pub struct OrientationParams {
    pub smoothing_iterations: usize,
    pub gaussian_expansion_factor: f32,
    pub region_expansion_factor: f32,
}

impl Default for OrientationParams {
    fn default() -> Self {
        Self {
            smoothing_iterations: ORIENTATION_SMOOTHING_ITERATIONS,
            gaussian_expansion_factor: ORIENTATION_GAUSSIAN_EXPANSION_FACTOR,
            region_expansion_factor: ORIENTATION_REGION_EXPANSION_FACTOR,
        }
    }
}

/// Keypoint with its dominant orientation in degrees, `[0, 360)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedKeypoint {
    pub keypoint: Keypoint,
    pub angle: f32,
}

/// Gaussian-weighted gradient histogram around `(cx, cy)` with `sigma` in
/// the pixel units of `img`.
pub fn orientation_histogram(
    img: &ImageF32,
    cx: f32,
    cy: f32,
    sigma: f32,
    params: &OrientationParams,
) -> OrientationHistogram {
    let mut hist = [0.0f32; ORIENTATION_NUM_BINS];
    let radius = (sigma * params.region_expansion_factor).max(1.0);
    let g_sigma = sigma * params.gaussian_expansion_factor;
    let g_denom = 2.0 * g_sigma * g_sigma;
    let r2 = radius * radius;

    let x0 = (cx - radius).floor() as isize;
    let x1 = (cx + radius).ceil() as isize;
    let y0 = (cy - radius).floor() as isize;
    let y1 = (cy + radius).ceil() as isize;

    for y in y0..=y1 {
        if y < 0 || y >= img.h as isize {
            continue;
        }
        for x in x0..=x1 {
            if x < 0 || x >= img.w as isize {
                continue;
            }
            let ddx = x as f32 - cx;
            let ddy = y as f32 - cy;
            let d2 = ddx * ddx + ddy * ddy;
            if d2 > r2 {
                continue;
            }

            let gx = img.at_clamped(x + 1, y) - img.at_clamped(x - 1, y);
            let gy = img.at_clamped(x, y + 1) - img.at_clamped(x, y - 1);
            let mag = (gx * gx + gy * gy).sqrt();
            if mag == 0.0 {
                continue;
            }

            let weight = (-d2 / g_denom).exp() * mag;
            let deg = gy.atan2(gx).to_degrees().rem_euclid(360.0);
            // bin i is centred on (i + 0.5) * BIN_DEGREES
            let f = deg / BIN_DEGREES - 0.5;
            let fl = f.floor();
            let frac = f - fl;
            let b0 = (fl as isize).rem_euclid(ORIENTATION_NUM_BINS as isize) as usize;
            let b1 = (b0 + 1) % ORIENTATION_NUM_BINS;
            hist[b0] += weight * (1.0 - frac);
            hist[b1] += weight * frac;
        }
    }

    hist
}

/// Circular `[1, 2, 1] / 4` smoothing, applied `iterations` times.
pub fn smooth_histogram(hist: &mut OrientationHistogram, iterations: usize) {
    let n = ORIENTATION_NUM_BINS;
    for _ in 0..iterations {
        let prev = *hist;
        for i in 0..n {
            let l = prev[(i + n - 1) % n];
            let r = prev[(i + 1) % n];
            hist[i] = 0.25 * l + 0.5 * prev[i] + 0.25 * r;
        }
    }
}

/// Centre angle of the strongest bin, in degrees. The first maximum wins
/// ties. `None` for an empty or non-finite histogram.
pub fn dominant_angle(hist: &OrientationHistogram) -> Option<f32> {
    let mut best = 0usize;
    for i in 1..ORIENTATION_NUM_BINS {
        if hist[i] > hist[best] {
            best = i;
        }
    }
    let peak = hist[best];
    if !(peak > 0.0) || !peak.is_finite() {
        return None;
    }
    Some((best as f32 + 0.5) * BIN_DEGREES)
}

/// Orientation of a single keypoint, or `None` on a flat neighbourhood.
pub fn compute_orientation(
    pyr: &DogPyramid,
    kp: &Keypoint,
    params: &OrientationParams,
) -> Option<f32> {
    let octave = pyr.octaves.get(kp.octave)?;
    let (ox, oy) = kp.octave_xy();
    let mut hist = orientation_histogram(&octave.image1, ox, oy, kp.octave_sigma(), params);
    smooth_histogram(&mut hist, params.smoothing_iterations);
    dominant_angle(&hist)
}

/// Assign orientations, dropping keypoints without a usable gradient.
pub fn assign_orientations(
    pyr: &DogPyramid,
    keypoints: &[Keypoint],
    params: &OrientationParams,
) -> Vec<OrientedKeypoint> {
    keypoints
        .iter()
        .filter_map(|kp| {
            compute_orientation(pyr, kp, params).map(|angle| OrientedKeypoint {
                keypoint: *kp,
                angle,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circular_distance(a: f32, b: f32) -> f32 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test]
    fn equal_maxima_resolve_to_the_lower_bin() {
        let mut hist = [0.0f32; ORIENTATION_NUM_BINS];
        hist[3] = 7.0;
        hist[20] = 7.0;
        hist[10] = 2.0;
        assert_eq!(dominant_angle(&hist), Some(35.0));

        let mut hist = [1.0f32; ORIENTATION_NUM_BINS];
        hist[0] = 4.0;
        hist[35] = 4.0;
        assert_eq!(dominant_angle(&hist), Some(5.0));
    }

    #[test]
    fn empty_histogram_has_no_angle() {
        assert_eq!(dominant_angle(&[0.0; ORIENTATION_NUM_BINS]), None);
        let mut hist = [0.0f32; ORIENTATION_NUM_BINS];
        hist[4] = f32::NAN;
        assert_eq!(dominant_angle(&hist), None);
    }

    #[test]
    fn smoothing_preserves_mass_and_spreads_peaks() {
        let mut hist = [0.0f32; ORIENTATION_NUM_BINS];
        hist[0] = 36.0;
        smooth_histogram(&mut hist, 1);
        assert!((hist.iter().sum::<f32>() - 36.0).abs() < 1e-4);
        assert!((hist[0] - 18.0).abs() < 1e-6);
        assert!((hist[1] - 9.0).abs() < 1e-6);
        assert!((hist[35] - 9.0).abs() < 1e-6);
        smooth_histogram(&mut hist, 4);
        assert!((hist.iter().sum::<f32>() - 36.0).abs() < 1e-3);
        assert_eq!(dominant_angle(&hist), Some(5.0));
    }

    #[test]
    fn ramps_point_along_their_gradient() {
        let params = OrientationParams::default();
        let horizontal = ImageF32::from_fn(21, 21, |x, _| 4.0 * x as f32);
        let mut h = orientation_histogram(&horizontal, 10.0, 10.0, 2.0, &params);
        smooth_histogram(&mut h, params.smoothing_iterations);
        let a = dominant_angle(&h).unwrap();
        assert!(circular_distance(a, 0.0) <= 5.0 + 1e-3, "angle {a}");

        let vertical = ImageF32::from_fn(21, 21, |_, y| 4.0 * y as f32);
        let mut h = orientation_histogram(&vertical, 10.0, 10.0, 2.0, &params);
        smooth_histogram(&mut h, params.smoothing_iterations);
        let a = dominant_angle(&h).unwrap();
        assert!(circular_distance(a, 90.0) <= 5.0 + 1e-3, "angle {a}");
    }

    #[test]
    fn flat_patch_is_degenerate() {
        let flat = ImageF32::from_fn(16, 16, |_, _| 77.0);
        let params = OrientationParams::default();
        let h = orientation_histogram(&flat, 8.0, 8.0, 1.5, &params);
        assert_eq!(dominant_angle(&h), None);
    }
}
