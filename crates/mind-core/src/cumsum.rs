//! Summed-area tables for constant-time window statistics.
//!
//! The table carries one row and one column of zero padding so that
//! `sum(rect) = C[x2,y2] - C[x1,y2] - C[x2,y1] + C[x1,y1]` holds without
//! special cases at the image border. Sums are accumulated in `f64`, which is
//! exact for 8-bit intensities (and their squares) on any realistic image.
//!
//! Out-of-bounds policy: queries are **rejected**. A window that leaves the
//! image or has inverted corners yields `None`; nothing is clamped.

/// Prefix-sum table over a `w × h` plane.
#[derive(Clone, Debug)]
pub struct CumsumTable {
    w: usize,
    h: usize,
    table: Vec<f64>,
}

impl CumsumTable {
    /// Table over raw intensities.
    pub fn new(w: usize, h: usize, data: &[u8]) -> Self {
        Self::from_fn(w, h, |i| data[i] as f64)
    }

    /// Table over squared intensities.
    pub fn squared(w: usize, h: usize, data: &[u8]) -> Self {
        Self::from_fn(w, h, |i| {
            let v = data[i] as f64;
            v * v
        })
    }

    fn from_fn(w: usize, h: usize, value: impl Fn(usize) -> f64) -> Self {
        let stride = w + 1;
        let mut table = vec![0.0f64; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0.0f64;
            for x in 0..w {
                row += value(y * w + x);
                table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row;
            }
        }
        Self { w, h, table }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.h
    }

    /// Sum over the inclusive rectangle `[x0, x1] × [y0, y1]`.
    pub fn window_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> Option<f64> {
        if x0 > x1 || y0 > y1 || x1 >= self.w || y1 >= self.h {
            return None;
        }
        let s = self.w + 1;
        let a = self.table[(y1 + 1) * s + x1 + 1];
        let b = self.table[(y1 + 1) * s + x0];
        let c = self.table[y0 * s + x1 + 1];
        let d = self.table[y0 * s + x0];
        Some(a - b - c + d)
    }
}

/// Mean and standard deviation of one window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    pub sd: f64,
    pub count: usize,
}

impl WindowStats {
    /// Derive window statistics from an intensity table and its squared
    /// companion. Returns `None` for windows outside the image and for
    /// numerically degenerate results.
    pub fn from_tables(
        sum: &CumsumTable,
        sqr: &CumsumTable,
        x0: usize,
        y0: usize,
        x1: usize,
        y1: usize,
    ) -> Option<Self> {
        let s = sum.window_sum(x0, y0, x1, y1)?;
        let s2 = sqr.window_sum(x0, y0, x1, y1)?;
        let count = (x1 - x0 + 1) * (y1 - y0 + 1);
        let n = count as f64;

        let mean = s / n;
        let mut var = s2 / n - mean * mean;
        // Cancellation on flat windows can leave a tiny negative residue.
        if var < 0.0 && var > -1e-9 * (s2 / n).max(1.0) {
            var = 0.0;
        }
        if !mean.is_finite() || !(var >= 0.0) {
            return None;
        }

        Some(Self {
            mean,
            sd: var.sqrt(),
            count,
        })
    }
}
