//! Grayscale rasters used throughout the pipeline.
//!
//! Inputs arrive as borrowed 8-bit luminance buffers ([`ImageView`]); every
//! blurred or differenced plane is an owned row-major [`ImageF32`].

use crate::error::InputError;

/// Borrowed 8-bit grayscale image, validated on construction.
///
/// Fields are private, so every view went through
/// [`from_u8_slice`](Self::from_u8_slice):
///
/// ```compile_fail
/// use mind_core::ImageView;
/// let data = [0u8; 10];
/// let _ = ImageView { width: 8, height: 8, data: &data };
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    width: usize,
    height: usize,
    data: &'a [u8],
}

impl<'a> ImageView<'a> {
    /// Wrap a row-major `width * height` luminance buffer.
    pub fn from_u8_slice(width: usize, height: usize, data: &'a [u8]) -> Result<Self, InputError> {
        if width == 0 || height == 0 {
            return Err(InputError::ZeroDimension { width, height });
        }
        if data.is_empty() {
            return Err(InputError::EmptyImage);
        }
        let expected = width
            .checked_mul(height)
            .ok_or(InputError::DataLengthMismatch {
                expected: usize::MAX,
                actual: data.len(),
            })?;
        if data.len() != expected {
            return Err(InputError::DataLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major pixels; always `width * height` long.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Owned single-channel float plane in row-major layout.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    pub w: usize,
    pub h: usize,
    pub data: Vec<f32>,
}

impl ImageF32 {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0.0; w * h],
        }
    }

    /// Convert an 8-bit view to float, preserving the [0, 255] range.
    pub fn from_view(view: ImageView<'_>) -> Self {
        Self {
            w: view.width,
            h: view.height,
            data: view.data.iter().map(|&v| v as f32).collect(),
        }
    }

    /// Build a plane by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(w: usize, h: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                data.push(f(x, y));
            }
        }
        Self { w, h, data }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.w + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.w + x] = v;
    }

    /// Pixel value with clamp-to-edge addressing.
    #[inline]
    pub fn at_clamped(&self, x: isize, y: isize) -> f32 {
        let xx = x.clamp(0, self.w as isize - 1) as usize;
        let yy = y.clamp(0, self.h as isize - 1) as usize;
        self.at(xx, yy)
    }

    /// Bilinear sample at a subpixel position; coordinates are clamped to
    /// the image so border lookups replicate the edge.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        if self.w == 0 || self.h == 0 {
            return 0.0;
        }

        let max_x = (self.w - 1) as f32;
        let max_y = (self.h - 1) as f32;
        let xf = x.clamp(0.0, max_x);
        let yf = y.clamp(0.0, max_y);

        let x0 = xf.floor() as usize;
        let y0 = yf.floor() as usize;
        let x1 = (x0 + 1).min(self.w - 1);
        let y1 = (y0 + 1).min(self.h - 1);

        let wx = xf - x0 as f32;
        let wy = yf - y0 as f32;

        let i00 = self.at(x0, y0);
        let i10 = self.at(x1, y0);
        let i01 = self.at(x0, y1);
        let i11 = self.at(x1, y1);

        let i0 = i00 * (1.0 - wx) + i10 * wx;
        let i1 = i01 * (1.0 - wx) + i11 * wx;
        i0 * (1.0 - wy) + i1 * wy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_rejects_malformed_buffers() {
        let data = vec![0u8; 12];
        assert_eq!(
            ImageView::from_u8_slice(0, 4, &data).unwrap_err(),
            InputError::ZeroDimension {
                width: 0,
                height: 4
            }
        );
        assert_eq!(
            ImageView::from_u8_slice(4, 4, &[]).unwrap_err(),
            InputError::EmptyImage
        );
        assert_eq!(
            ImageView::from_u8_slice(4, 4, &data).unwrap_err(),
            InputError::DataLengthMismatch {
                expected: 16,
                actual: 12
            }
        );
        assert!(ImageView::from_u8_slice(4, 3, &data).is_ok());
    }

    #[test]
    fn accessors_report_the_validated_shape() {
        let data: Vec<u8> = (0..12).collect();
        let view = ImageView::from_u8_slice(4, 3, &data).unwrap();
        assert_eq!((view.width(), view.height()), (4, 3));
        assert_eq!(view.data().len(), view.width() * view.height());
        assert_eq!(view.get(3, 2), 11);
    }

    #[test]
    fn bilinear_interpolates_between_pixels_and_clamps_outside() {
        let img = ImageF32 {
            w: 2,
            h: 2,
            data: vec![0.0, 10.0, 20.0, 30.0],
        };
        assert!((img.sample_bilinear(0.5, 0.0) - 5.0).abs() < 1e-6);
        assert!((img.sample_bilinear(0.5, 0.5) - 15.0).abs() < 1e-6);
        assert!((img.sample_bilinear(-3.0, -3.0) - 0.0).abs() < 1e-6);
        assert!((img.sample_bilinear(9.0, 9.0) - 30.0).abs() < 1e-6);
    }
}
