//! Rescaled keyframes for the matching and tracking stages.
//!
//! Matching uses a geometric ladder of scales so features are found at
//! every apparent target size down to `min_image_pixel_size` pixels on the
//! short side. Tracking uses two fixed working sizes. Reductions use
//! area-weighted averaging; a scale of `1.0` copies the input.

use mind_core::{ImageView, InputError};

pub const MIN_IMAGE_PIXEL_SIZE: usize = 100;
/// Ratio between consecutive matching scales, `2^(1/3)`.
pub const SCALE_STEP: f32 = 1.259_921;
pub const TRACKING_SIZES: [usize; 2] = [256, 128];

/// Once the ladder gets this close to full size it snaps to `1.0`.
const SNAP_TO_FULL: f32 = 0.95;

#[derive(Clone, Debug, PartialEq)]
pub struct ImageListParams {
    pub min_image_pixel_size: usize,
    pub scale_step: f32,
    /// Short-side sizes of the tracking keyframes, largest first.
    pub tracking_sizes: Vec<usize>,
}

impl Default for ImageListParams {
    fn default() -> Self {
        Self {
            min_image_pixel_size: MIN_IMAGE_PIXEL_SIZE,
            scale_step: SCALE_STEP,
            tracking_sizes: TRACKING_SIZES.to_vec(),
        }
    }
}

/// A rescaled copy of a source image.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub width: usize,
    pub height: usize,
    /// Keyframe size relative to the source image.
    pub scale: f32,
    pub data: Vec<u8>,
}

impl Keyframe {
    /// Borrow the pixels as a view; fails if the public fields were edited
    /// into an inconsistent shape.
    #[inline]
    pub fn view(&self) -> Result<ImageView<'_>, InputError> {
        ImageView::from_u8_slice(self.width, self.height, &self.data)
    }
}

/// Matching scales, descending from `1.0` to the smallest useful scale.
/// Images whose short side is already at most `min_image_pixel_size` get
/// a single full-size keyframe.
pub fn matching_scales(width: usize, height: usize, params: &ImageListParams) -> Vec<f32> {
    let min_dim = width.min(height).max(1) as f32;
    let min_scale = params.min_image_pixel_size as f32 / min_dim;
    if min_scale >= 1.0 {
        return vec![1.0];
    }

    let step = params.scale_step.max(1.01);
    let mut scales = Vec::new();
    let mut c = min_scale;
    loop {
        scales.push(c);
        c *= step;
        if c >= SNAP_TO_FULL {
            break;
        }
    }
    scales.push(1.0);
    scales.reverse();
    scales
}

/// Tracking scales: each configured size relative to the short side,
/// capped at `1.0`, with consecutive duplicates removed.
pub fn tracking_scales(width: usize, height: usize, params: &ImageListParams) -> Vec<f32> {
    let min_dim = width.min(height).max(1) as f32;
    let mut scales: Vec<f32> = params
        .tracking_sizes
        .iter()
        .map(|&s| (s as f32 / min_dim).min(1.0))
        .collect();
    scales.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
    scales
}

pub fn build_image_list(img: ImageView<'_>, params: &ImageListParams) -> Vec<Keyframe> {
    matching_scales(img.width(), img.height(), params)
        .into_iter()
        .map(|s| resize(img, s))
        .collect()
}

pub fn build_tracking_image_list(img: ImageView<'_>, params: &ImageListParams) -> Vec<Keyframe> {
    tracking_scales(img.width(), img.height(), params)
        .into_iter()
        .map(|s| resize(img, s))
        .collect()
}

/// Rescale by `scale` (at most `1.0`), rounding the target size.
pub fn resize(img: ImageView<'_>, scale: f32) -> Keyframe {
    if scale >= 1.0 {
        return Keyframe {
            width: img.width(),
            height: img.height(),
            scale: 1.0,
            data: img.data().to_vec(),
        };
    }
    let w = ((img.width() as f32 * scale).round() as usize).max(1);
    let h = ((img.height() as f32 * scale).round() as usize).max(1);
    Keyframe {
        width: w,
        height: h,
        scale,
        data: resize_area(img, w, h),
    }
}

/// Source pixels covered by each destination pixel along one axis, with
/// their fractional coverage.
fn area_weights(src: usize, dst: usize) -> Vec<Vec<(usize, f32)>> {
    let ratio = src as f32 / dst as f32;
    (0..dst)
        .map(|i| {
            let a = i as f32 * ratio;
            let b = ((i + 1) as f32 * ratio).min(src as f32);
            let first = a.floor() as usize;
            let last = (b.ceil() as usize).min(src);
            (first..last)
                .filter_map(|c| {
                    let cover = b.min((c + 1) as f32) - a.max(c as f32);
                    (cover > 0.0).then_some((c, cover))
                })
                .collect()
        })
        .collect()
}

/// Area-weighted reduction to `w × h`.
pub fn resize_area(img: ImageView<'_>, w: usize, h: usize) -> Vec<u8> {
    let wx = area_weights(img.width(), w);
    let wy = area_weights(img.height(), h);
    let mut out = Vec::with_capacity(w * h);

    for row in &wy {
        for col in &wx {
            let mut acc = 0.0f32;
            let mut norm = 0.0f32;
            for &(sy, fy) in row {
                for &(sx, fx) in col {
                    let f = fx * fy;
                    acc += f * img.get(sx, sy) as f32;
                    norm += f;
                }
            }
            let v = if norm > 0.0 { acc / norm } else { 0.0 };
            out.push(v.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn small_images_keep_a_single_full_scale_keyframe() {
        let p = ImageListParams::default();
        assert_eq!(matching_scales(64, 64, &p), vec![1.0]);
        assert_eq!(matching_scales(100, 400, &p), vec![1.0]);
    }

    #[test]
    fn matching_ladder_descends_to_the_minimum_size() {
        let p = ImageListParams::default();
        let scales = matching_scales(640, 480, &p);
        let min_scale = 100.0 / 480.0;

        assert_eq!(scales[0], 1.0);
        assert_relative_eq!(*scales.last().unwrap(), min_scale, epsilon = 1e-6);
        for pair in scales.windows(2) {
            assert!(pair[0] > pair[1]);
        }
        for pair in scales[1..].windows(2) {
            assert_relative_eq!(pair[0] / pair[1], SCALE_STEP, epsilon = 1e-4);
        }
        assert!(scales[1] < SNAP_TO_FULL);
    }

    #[test]
    fn tracking_scales_are_capped_and_deduplicated() {
        let p = ImageListParams::default();
        let s = tracking_scales(1000, 800, &p);
        assert_eq!(s.len(), 2);
        assert_relative_eq!(s[0], 0.32);
        assert_relative_eq!(s[1], 0.16);

        let s = tracking_scales(200, 150, &p);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0], 1.0);
        assert_relative_eq!(s[1], 128.0 / 150.0);

        assert_eq!(tracking_scales(100, 100, &p), vec![1.0]);
    }

    #[test]
    fn halving_is_a_box_average() {
        let data: Vec<u8> = vec![
            0, 10, 100, 100, //
            20, 30, 100, 100, //
            5, 5, 200, 0, //
            5, 5, 0, 200,
        ];
        let view = ImageView::from_u8_slice(4, 4, &data).unwrap();
        let k = resize(view, 0.5);
        assert_eq!((k.width, k.height), (2, 2));
        assert_eq!(k.data, vec![15, 100, 5, 100]);
    }

    #[test]
    fn fractional_reduction_weights_partial_pixels() {
        let data = vec![0u8, 30, 60];
        let view = ImageView::from_u8_slice(3, 1, &data).unwrap();
        assert_eq!(resize_area(view, 2, 1), vec![10, 50]);
    }

    #[test]
    fn full_scale_copies() {
        let data: Vec<u8> = (0..35).collect();
        let view = ImageView::from_u8_slice(7, 5, &data).unwrap();
        let k = resize(view, 1.0);
        assert_eq!(k.data, data);
        assert_eq!(k.view().unwrap().width(), 7);
        assert_eq!(build_image_list(view, &ImageListParams::default()).len(), 1);
    }

    #[test]
    fn edited_keyframe_view_is_rejected() {
        let data = vec![9u8; 16];
        let view = ImageView::from_u8_slice(4, 4, &data).unwrap();
        let mut k = resize(view, 1.0);
        k.width = 8;
        assert_eq!(
            k.view().unwrap_err(),
            InputError::DataLengthMismatch {
                expected: 32,
                actual: 16
            }
        );
    }
}
