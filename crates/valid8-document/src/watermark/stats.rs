// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Numeric helpers shared by the detectors: summed-area tables, correlation,
// and polygon area.

use image::GrayImage;

/// Summed-area tables of pixel values and squared pixel values.
///
/// Both tables are `(width+1) x (height+1)` with a zero-padded first row and
/// column, so `table[y * stride + x]` is the sum over `[0, x) x [0, y)`.
pub(crate) struct SummedArea {
    stride: usize,
    sum: Vec<f64>,
    squared: Vec<f64>,
}

impl SummedArea {
    pub(crate) fn new(gray: &GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let stride = (w + 1) as usize;
        let mut sum = vec![0.0f64; stride * (h + 1) as usize];
        let mut squared = vec![0.0f64; stride * (h + 1) as usize];

        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = gray.get_pixel(x, y).0[0] as f64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) as usize * stride + (x + 1) as usize;
                let above = y as usize * stride + (x + 1) as usize;
                sum[idx] = row_sum + sum[above];
                squared[idx] = row_sq + squared[above];
            }
        }

        Self {
            stride,
            sum,
            squared,
        }
    }

    /// Sum and sum of squares over the `width x height` window at `(x, y)`.
    pub(crate) fn window(&self, x: u32, y: u32, width: u32, height: u32) -> (f64, f64) {
        let (x1, y1) = (x as usize, y as usize);
        let (x2, y2) = ((x + width) as usize, (y + height) as usize);
        let s = self.stride;
        let lookup = |table: &[f64]| {
            table[y2 * s + x2] - table[y1 * s + x2] - table[y2 * s + x1] + table[y1 * s + x1]
        };
        (lookup(&self.sum), lookup(&self.squared))
    }
}

/// Mean-subtracted normalized correlation of two equally sized blocks of
/// `image`, both `width x height`, at `(ax, y)` and `(bx, y)`. Returns 0 when
/// either block is flat.
pub(crate) fn block_correlation(
    image: &GrayImage,
    ax: u32,
    bx: u32,
    y: u32,
    width: u32,
    height: u32,
) -> f64 {
    let n = (width * height) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for dy in 0..height {
        for dx in 0..width {
            let a = image.get_pixel(ax + dx, y + dy).0[0] as f64;
            let b = image.get_pixel(bx + dx, y + dy).0[0] as f64;
            sa += a;
            sb += b;
            saa += a * a;
            sbb += b * b;
            sab += a * b;
        }
    }
    let cov = sab - sa * sb / n;
    let var_a = saa - sa * sa / n;
    let var_b = sbb - sb * sb / n;
    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Area of a closed polygon by the shoelace formula. Vertices in order, CW or
/// CCW.
pub(crate) fn shoelace_area(points: &[(f64, f64)]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].0 * points[j].1;
        area -= points[j].0 * points[i].1;
    }
    area.abs() / 2.0
}
