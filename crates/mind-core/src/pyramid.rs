//! Gaussian scale space and difference-of-Gaussian planes.
//!
//! Each octave holds two blurred images: `image1 = blur(input)` and
//! `image2 = blur(image1)`. Octave 0's input is the keyframe itself; every
//! later octave starts from a 2×2 box downsample of the previous `image2`.
//! The DoG plane is `image2 - image1`.
//!
//! The blur is a real separable Gaussian with clamp-to-edge borders. The
//! effective sigma of every plane is tracked so detections can report a
//! physical scale in keyframe pixels.

use crate::image::{ImageF32, ImageView};

/// Stop halving once either dimension drops below this size.
pub const PYRAMID_MIN_SIZE: usize = 8;
/// Upper bound on the number of octaves.
pub const PYRAMID_MAX_OCTAVE: usize = 5;

/// Parameters controlling scale-space construction.
#[derive(Clone, Debug, PartialEq)]
pub struct PyramidParams {
    /// Minimum width/height an octave may have.
    pub min_size: usize,
    /// Maximum number of octaves.
    pub max_octaves: usize,
    /// Sigma of each blur pass, in octave pixels.
    pub blur_sigma: f32,
    /// Blur assumed to be already present in the keyframe.
    pub input_sigma: f32,
}

impl Default for PyramidParams {
    fn default() -> Self {
        Self {
            min_size: PYRAMID_MIN_SIZE,
            max_octaves: PYRAMID_MAX_OCTAVE,
            blur_sigma: 1.0,
            input_sigma: 0.5,
        }
    }
}

/// One octave of the scale space.
#[derive(Clone, Debug)]
pub struct Octave {
    pub image1: ImageF32,
    pub image2: ImageF32,
    pub dog: ImageF32,
    /// Effective sigma of `image1`, in octave pixels.
    pub sigma1: f32,
    /// Effective sigma of `image2`, in octave pixels.
    pub sigma2: f32,
}

impl Octave {
    /// Characteristic scale of the DoG plane, in octave pixels.
    #[inline]
    pub fn dog_sigma(&self) -> f32 {
        (self.sigma1 * self.sigma2).sqrt()
    }
}

/// Difference-of-Gaussian pyramid; `octaves[0]` is full keyframe resolution.
#[derive(Clone, Debug)]
pub struct DogPyramid {
    pub octaves: Vec<Octave>,
}

impl DogPyramid {
    #[inline]
    pub fn num_octaves(&self) -> usize {
        self.octaves.len()
    }

    /// DoG sigma of octave 0 in keyframe pixels (`σ0`).
    #[inline]
    pub fn base_sigma(&self) -> Option<f32> {
        self.octaves.first().map(Octave::dog_sigma)
    }

    /// Octave a keypoint scale belongs to: `floor(log2(scale / σ0))`, or
    /// `None` when that falls outside the pyramid.
    pub fn octave_of_scale(&self, scale: f32) -> Option<usize> {
        let o = (scale / self.base_sigma()?).log2().floor();
        if o >= 0.0 && (o as usize) < self.octaves.len() {
            Some(o as usize)
        } else {
            None
        }
    }
}

/// Number of octaves for a `w × h` keyframe.
pub fn num_octaves(w: usize, h: usize, params: &PyramidParams) -> usize {
    let (mut w, mut h) = (w, h);
    let mut n = 0;
    while w >= params.min_size && h >= params.min_size && n < params.max_octaves {
        w /= 2;
        h /= 2;
        n += 1;
    }
    n
}

/// Build the DoG pyramid for one keyframe.
pub fn build_dog_pyramid(img: ImageView<'_>, params: &PyramidParams) -> DogPyramid {
    let n = num_octaves(img.width(), img.height(), params);
    let kernel = gaussian_kernel_1d(params.blur_sigma);
    let b2 = params.blur_sigma * params.blur_sigma;

    let mut octaves: Vec<Octave> = Vec::with_capacity(n);
    let mut input = ImageF32::from_view(img);
    let mut input_sigma = params.input_sigma;

    for o in 0..n {
        if o > 0 {
            let prev = &octaves[o - 1];
            input = downsample_2x(&prev.image2);
            // 2x2 box adds variance 1/4 in source pixels before halving.
            input_sigma = (prev.sigma2 * prev.sigma2 + 0.25).sqrt() * 0.5;
        }

        let image1 = convolve_separable(&input, &kernel);
        let image2 = convolve_separable(&image1, &kernel);
        let dog = difference(&image2, &image1);

        let s_in2 = input_sigma * input_sigma;
        octaves.push(Octave {
            image1,
            image2,
            dog,
            sigma1: (s_in2 + b2).sqrt(),
            sigma2: (s_in2 + 2.0 * b2).sqrt(),
        });
    }

    DogPyramid { octaves }
}

/// Normalised 1D Gaussian with radius `ceil(3σ)` (at least 1).
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    let half = (3.0 * sigma).ceil().max(1.0) as isize;
    let denom = 2.0 * sigma * sigma;
    let mut k: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

/// Horizontal then vertical pass with the same kernel, clamping at borders.
pub fn convolve_separable(src: &ImageF32, kernel: &[f32]) -> ImageF32 {
    debug_assert!(kernel.len() % 2 == 1, "kernel length must be odd");
    let (w, h) = (src.w, src.h);
    let half = (kernel.len() / 2) as isize;

    let mut tmp = ImageF32::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = x as isize + ki as isize - half;
                acc += src.at_clamped(sx, y as isize) * kv;
            }
            tmp.set(x, y, acc);
        }
    }

    let mut out = ImageF32::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = y as isize + ki as isize - half;
                acc += tmp.at_clamped(x as isize, sy) * kv;
            }
            out.set(x, y, acc);
        }
    }
    out
}

/// 2×2 box downsample; odd trailing rows/columns are dropped.
fn downsample_2x(src: &ImageF32) -> ImageF32 {
    let w2 = (src.w / 2).max(1);
    let h2 = (src.h / 2).max(1);
    let mut dst = ImageF32::new(w2, h2);

    for y in 0..h2 {
        for x in 0..w2 {
            let sx = (x * 2) as isize;
            let sy = (y * 2) as isize;
            let p00 = src.at_clamped(sx, sy);
            let p01 = src.at_clamped(sx + 1, sy);
            let p10 = src.at_clamped(sx, sy + 1);
            let p11 = src.at_clamped(sx + 1, sy + 1);
            dst.set(x, y, (p00 + p01 + p10 + p11) * 0.25);
        }
    }
    dst
}

fn difference(a: &ImageF32, b: &ImageF32) -> ImageF32 {
    ImageF32 {
        w: a.w,
        h: a.h,
        data: a.data.iter().zip(&b.data).map(|(x, y)| x - y).collect(),
    }
}
