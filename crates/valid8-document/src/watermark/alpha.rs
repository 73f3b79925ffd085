// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transparency analysis: watermarks embedded as graded alpha.

use valid8_core::error::Result;
use valid8_core::types::WatermarkType;

use super::{AnalysisInput, Detection, WatermarkDetector};

/// Distinct alpha levels required before variance is considered.
const MIN_ALPHA_LEVELS: usize = 10;

#[derive(Debug, Default)]
pub struct AlphaChannelDetector;

impl WatermarkDetector for AlphaChannelDetector {
    fn name(&self) -> &'static str {
        "alpha_watermark"
    }

    fn kind(&self) -> WatermarkType {
        WatermarkType::Alpha
    }

    fn detect(&self, input: &AnalysisInput<'_>) -> Result<Detection> {
        let image = input.frame.image();
        if !image.color().has_alpha() {
            return Ok(Detection::new(0.0).with("has_alpha", false));
        }

        let rgba = image.to_rgba8();
        let mut seen = [false; 256];
        let (mut sum, mut sum_sq) = (0.0f64, 0.0f64);
        for pixel in rgba.pixels() {
            let a = pixel.0[3];
            seen[a as usize] = true;
            sum += a as f64;
            sum_sq += (a as f64).powi(2);
        }
        let levels = seen.iter().filter(|s| **s).count();
        if levels <= MIN_ALPHA_LEVELS {
            return Ok(Detection::new(0.0).with("alpha_levels", levels));
        }

        let n = (rgba.width() as f64) * (rgba.height() as f64);
        let mean = sum / n;
        let variance = sum_sq / n - mean * mean;
        Ok(Detection::new((variance / 10_000.0).clamp(0.0, 1.0) as f32)
            .with("alpha_levels", levels)
            .with("alpha_variance", variance))
    }
}
