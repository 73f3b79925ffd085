// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frequency-domain detection of invisible (digital) watermarks: DCT energy in
// the high-frequency quadrant, reinforced by Haar wavelet detail energy.

use std::f64::consts::PI;
use std::sync::Arc;

use image::GrayImage;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use valid8_core::error::Result;
use valid8_core::types::WatermarkType;

use super::stats::std_dev;
use super::{AnalysisInput, Detection, WatermarkDetector};

/// Summed detail deviation above which the wavelet test contributes.
const WAVELET_STD_THRESHOLD: f64 = 10.0;

/// Scores high-frequency energy.
#[derive(Debug, Default)]
pub struct FrequencyDetector;

impl WatermarkDetector for FrequencyDetector {
    fn name(&self) -> &'static str {
        "digital_watermark"
    }

    fn kind(&self) -> WatermarkType {
        WatermarkType::Digital
    }

    fn detect(&self, input: &AnalysisInput<'_>) -> Result<Detection> {
        let ratio = high_frequency_ratio(input.working);
        let mut confidence = (5.0 * ratio).min(1.0);

        let detail = haar_detail_std(input.gray);
        if detail > WAVELET_STD_THRESHOLD {
            confidence = confidence.max((detail / 50.0).min(1.0));
        }
        Ok(Detection::new(confidence as f32)
            .with("high_frequency_ratio", ratio)
            .with("wavelet_detail_std", detail))
    }
}

/// Σ|bottom-right quadrant| / Σ|all| of the orthonormal 2-D DCT-II of
/// `gray / 255`. 0 for an all-zero spectrum.
pub(crate) fn high_frequency_ratio(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return 0.0;
    }

    let mut data: Vec<f64> = gray.pixels().map(|p| p.0[0] as f64 / 255.0).collect();
    let mut planner = FftPlanner::new();

    let row_dct = Dct2::new(&mut planner, w);
    for row in data.chunks_mut(w) {
        row_dct.apply(row);
    }

    let col_dct = Dct2::new(&mut planner, h);
    let mut column = vec![0.0; h];
    for x in 0..w {
        for y in 0..h {
            column[y] = data[y * w + x];
        }
        col_dct.apply(&mut column);
        for y in 0..h {
            data[y * w + x] = column[y];
        }
    }

    let mut total = 0.0;
    let mut high = 0.0;
    for y in 0..h {
        for x in 0..w {
            let magnitude = data[y * w + x].abs();
            total += magnitude;
            if y >= h / 2 && x >= w / 2 {
                high += magnitude;
            }
        }
    }
    if total > 0.0 { high / total } else { 0.0 }
}

/// Orthonormal DCT-II of one length, computed through a 2N-point FFT of the
/// mirrored sequence: `C_k = s_k · Re(e^{-iπk/2N} · FFT(x ‖ rev x)_k) / 2`.
struct Dct2 {
    len: usize,
    fft: Arc<dyn Fft<f64>>,
    twiddles: Vec<Complex<f64>>,
    buffer: Vec<Complex<f64>>,
}

impl Dct2 {
    fn new(planner: &mut FftPlanner<f64>, len: usize) -> Self {
        let twiddles = (0..len)
            .map(|k| {
                let scale = if k == 0 {
                    (1.0 / len as f64).sqrt()
                } else {
                    (2.0 / len as f64).sqrt()
                };
                Complex::from_polar(0.5 * scale, -PI * k as f64 / (2 * len) as f64)
            })
            .collect();
        Self {
            len,
            fft: planner.plan_fft_forward(2 * len),
            twiddles,
            buffer: vec![Complex::new(0.0, 0.0); 2 * len],
        }
    }

    fn apply(&self, values: &mut [f64]) {
        let n = self.len;
        let mut buffer = self.buffer.clone();
        for (i, &v) in values.iter().enumerate() {
            buffer[i] = Complex::new(v, 0.0);
            buffer[2 * n - 1 - i] = Complex::new(v, 0.0);
        }
        self.fft.process(&mut buffer);
        for (k, value) in values.iter_mut().enumerate() {
            *value = (buffer[k] * self.twiddles[k]).re;
        }
    }
}

/// std(H) + std(V) + std(D) of a single-level 2-D Haar transform. Odd
/// trailing rows or columns are dropped.
pub(crate) fn haar_detail_std(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() / 2, gray.height() / 2);
    if w == 0 || h == 0 {
        return 0.0;
    }
    let count = (w * h) as usize;
    let (mut horizontal, mut vertical, mut diagonal) =
        (Vec::with_capacity(count), Vec::with_capacity(count), Vec::with_capacity(count));

    for y in 0..h {
        for x in 0..w {
            let a = gray.get_pixel(2 * x, 2 * y).0[0] as f64;
            let b = gray.get_pixel(2 * x + 1, 2 * y).0[0] as f64;
            let c = gray.get_pixel(2 * x, 2 * y + 1).0[0] as f64;
            let d = gray.get_pixel(2 * x + 1, 2 * y + 1).0[0] as f64;
            horizontal.push((a + b - c - d) / 2.0);
            vertical.push((a - b + c - d) / 2.0);
            diagonal.push((a - b - c + d) / 2.0);
        }
    }
    std_dev(&horizontal) + std_dev(&vertical) + std_dev(&diagonal)
}
