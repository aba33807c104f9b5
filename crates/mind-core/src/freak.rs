//! FREAK-style binary descriptors.
//!
//! The sampling pattern is a fixed constellation of 37 points: six rings of
//! six points each, shrinking towards the centre, plus the centre itself.
//! Offsets are expressed in units of the keypoint's sampling radius
//! (`sigma * expansion_factor`), rotated by the keypoint orientation and
//! sampled bilinearly. The inner rings read the octave's `image2`; the three
//! outer rings read the next octave's `image1`, which carries roughly twice
//! the blur, when that octave exists. Every ordered pair `j < k` contributes
//! one bit, `value[j] < value[k]`.

use crate::extrema::Keypoint;
use crate::image::ImageF32;
use crate::orientation::OrientedKeypoint;
use crate::pyramid::DogPyramid;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

pub const FREAK_EXPANSION_FACTOR: f32 = 7.0;
pub const FREAK_NUM_POINTS: usize = 37;
pub const FREAK_COMPARISON_COUNT: usize = FREAK_NUM_POINTS * (FREAK_NUM_POINTS - 1) / 2;
/// Leading constellation entries (rings 5, 4 and 3) sampled at coarse blur.
pub const FREAK_OUTER_POINTS: usize = 18;

/// Sampling constellation, outermost ring first, centre last.
pub const FREAK_POINTS: [(f32, f32); FREAK_NUM_POINTS] = [
    // ring 5
    (-1.0, 0.0),
    (-0.5, -0.866025),
    (0.5, -0.866025),
    (1.0, 0.0),
    (0.5, 0.866025),
    (-0.5, 0.866025),
    // ring 4
    (0.0, 0.930969),
    (-0.806243, 0.465485),
    (-0.806243, -0.465485),
    (0.0, -0.930969),
    (0.806243, -0.465485),
    (0.806243, 0.465485),
    // ring 3
    (0.847306, 0.0),
    (0.423653, 0.733789),
    (-0.423653, 0.733789),
    (-0.847306, 0.0),
    (-0.423653, -0.733789),
    (0.423653, -0.733789),
    // ring 2
    (0.0, -0.741094),
    (0.641806, -0.370547),
    (0.641806, 0.370547),
    (0.0, 0.741094),
    (-0.641806, 0.370547),
    (-0.641806, -0.370547),
    // ring 1
    (-0.595502, 0.0),
    (-0.297751, -0.515720),
    (0.297751, -0.515720),
    (0.595502, 0.0),
    (0.297751, 0.515720),
    (-0.297751, 0.515720),
    // ring 0
    (0.0, 0.362783),
    (-0.314179, 0.181391),
    (-0.314179, -0.181391),
    (0.0, -0.362783),
    (0.314179, -0.181391),
    (0.314179, 0.181391),
    // centre
    (0.0, 0.0),
];

#[derive(Clone, Debug, PartialEq)]
pub struct FreakParams {
    /// Sampling radius in units of the keypoint sigma.
    pub expansion_factor: f32,
}

impl Default for FreakParams {
    fn default() -> Self {
        Self {
            expansion_factor: FREAK_EXPANSION_FACTOR,
        }
    }
}

/// Packed bit vector; bit `i` lives in byte `i / 8` at position `i % 8`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Descriptor {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl Descriptor {
    pub fn zeros(bit_len: usize) -> Self {
        Self {
            bytes: vec![0; bit_len.div_ceil(8)],
            bit_len,
        }
    }

    #[inline]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn bit(&self, i: usize) -> bool {
        debug_assert!(i < self.bit_len);
        (self.bytes[i / 8] >> (i % 8)) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: bool) {
        debug_assert!(i < self.bit_len);
        let mask = 1u8 << (i % 8);
        if value {
            self.bytes[i / 8] |= mask;
        } else {
            self.bytes[i / 8] &= !mask;
        }
    }

    /// Little-endian 32-bit words, the layout stored in `.mind` files.
    pub fn to_words(&self) -> Vec<u32> {
        self.bytes
            .chunks(4)
            .map(|c| {
                c.iter()
                    .enumerate()
                    .fold(0u32, |acc, (i, &b)| acc | ((b as u32) << (8 * i)))
            })
            .collect()
    }

    /// Inverse of [`to_words`](Self::to_words). `None` if `words` is too
    /// short for `bit_len` or carries set bits beyond it.
    pub fn from_words(words: &[u32], bit_len: usize) -> Option<Self> {
        let n_bytes = bit_len.div_ceil(8);
        if words.len() != n_bytes.div_ceil(4) {
            return None;
        }
        let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        if bytes[n_bytes..].iter().any(|&b| b != 0) {
            return None;
        }
        bytes.truncate(n_bytes);
        if bit_len % 8 != 0 && bytes[n_bytes - 1] >> (bit_len % 8) != 0 {
            return None;
        }
        Some(Self { bytes, bit_len })
    }
}

/// Described feature in keyframe pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct FeaturePoint {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    /// Orientation in degrees.
    pub angle: f32,
    pub maxima: bool,
    pub response: f32,
    pub descriptor: Descriptor,
}

/// Constellation positions for a patch centred on `(cx, cy)` with the given
/// sampling radius and orientation in degrees.
pub fn sample_points(
    cx: f32,
    cy: f32,
    radius: f32,
    angle_deg: f32,
) -> [(f32, f32); FREAK_NUM_POINTS] {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let mut out = [(0.0f32, 0.0f32); FREAK_NUM_POINTS];
    for (dst, &(px, py)) in out.iter_mut().zip(FREAK_POINTS.iter()) {
        let rx = cos * px - sin * py;
        let ry = sin * px + cos * py;
        *dst = (cx + rx * radius, cy + ry * radius);
    }
    out
}

/// Descriptor of the patch around `(cx, cy)` in `img`. `None` when a sample
/// is not finite.
pub fn describe_patch(
    img: &ImageF32,
    cx: f32,
    cy: f32,
    radius: f32,
    angle_deg: f32,
) -> Option<Descriptor> {
    let mut values = [0.0f32; FREAK_NUM_POINTS];
    for (v, (x, y)) in values.iter_mut().zip(sample_points(cx, cy, radius, angle_deg)) {
        *v = img.sample_bilinear(x, y);
    }
    compare_values(&values)
}

/// Descriptor of an oriented keypoint. Inner rings come from its octave's
/// `image2`, outer rings from the next octave's `image1` when there is one.
pub fn compute_descriptor(
    pyr: &DogPyramid,
    okp: &OrientedKeypoint,
    params: &FreakParams,
) -> Option<Descriptor> {
    let kp = &okp.keypoint;
    let fine = &pyr.octaves.get(kp.octave)?.image2;
    let coarse = pyr.octaves.get(kp.octave + 1).map(|o| &o.image1);
    let (ox, oy) = kp.octave_xy();
    let radius = kp.octave_sigma() * params.expansion_factor;

    let mut values = [0.0f32; FREAK_NUM_POINTS];
    let points = sample_points(ox, oy, radius, okp.angle);
    for (i, (v, (x, y))) in values.iter_mut().zip(points).enumerate() {
        *v = match coarse {
            Some(c) if i < FREAK_OUTER_POINTS => {
                c.sample_bilinear((x + 0.5) * 0.5 - 0.5, (y + 0.5) * 0.5 - 0.5)
            }
            _ => fine.sample_bilinear(x, y),
        };
    }
    compare_values(&values)
}

/// One bit per ordered pair `j < k`, set when `values[j] < values[k]`.
fn compare_values(values: &[f32; FREAK_NUM_POINTS]) -> Option<Descriptor> {
    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let mut desc = Descriptor::zeros(FREAK_COMPARISON_COUNT);
    let mut bit = 0;
    for j in 0..FREAK_NUM_POINTS {
        for k in j + 1..FREAK_NUM_POINTS {
            if values[j] < values[k] {
                desc.set(bit, true);
            }
            bit += 1;
        }
    }
    debug_assert_eq!(bit, FREAK_COMPARISON_COUNT);
    Some(desc)
}

fn to_feature(kp: &Keypoint, angle: f32, descriptor: Descriptor) -> FeaturePoint {
    FeaturePoint {
        x: kp.x,
        y: kp.y,
        scale: kp.scale,
        angle,
        maxima: kp.maxima,
        response: kp.response,
        descriptor,
    }
}

/// Describe every oriented keypoint, keeping input order. Keypoints whose
/// descriptor cannot be computed are dropped.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(keypoints = keypoints.len()))
)]
pub fn describe_keypoints(
    pyr: &DogPyramid,
    keypoints: &[OrientedKeypoint],
    params: &FreakParams,
) -> Vec<FeaturePoint> {
    let describe_one = |okp: &OrientedKeypoint| -> Option<FeaturePoint> {
        compute_descriptor(pyr, okp, params).map(|d| to_feature(&okp.keypoint, okp.angle, d))
    };

    #[cfg(feature = "rayon")]
    let out: Vec<FeaturePoint> = keypoints.par_iter().filter_map(describe_one).collect();

    #[cfg(not(feature = "rayon"))]
    let out: Vec<FeaturePoint> = keypoints.iter().filter_map(describe_one).collect();

    out
}
