// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-overlay detection: counts text-like outer contours in the edge map and
// looks for horizontally repeating edge patterns, typical of tiled "COPY" or
// institution-name watermarks.

use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::close;
use tracing::debug;
use valid8_core::error::Result;
use valid8_core::types::WatermarkType;

use super::stats::{block_correlation, shoelace_area};
use super::{AnalysisInput, Detection, WatermarkDetector};

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// Text-like contour area range at full resolution, exclusive.
const MIN_TEXT_AREA: f64 = 100.0;
const MAX_TEXT_AREA: f64 = 10_000.0;

/// Contours for full confidence.
const CONTOURS_FOR_FULL: f64 = 50.0;

/// Block size (and band height) of the repetition scan at full resolution.
const BLOCK: f64 = 50.0;
const REPEAT_CORRELATION: f64 = 0.8;
const REPEATS_REQUIRED: usize = 2;
const REPEAT_CONFIDENCE: f32 = 0.7;

#[derive(Debug, Default)]
pub struct TextOverlayDetector;

impl WatermarkDetector for TextOverlayDetector {
    fn name(&self) -> &'static str {
        "text_watermark"
    }

    fn kind(&self) -> WatermarkType {
        WatermarkType::Text
    }

    fn detect(&self, input: &AnalysisInput<'_>) -> Result<Detection> {
        let edges = canny(input.working, CANNY_LOW, CANNY_HIGH);

        let min_area = input.scaled_area(MIN_TEXT_AREA);
        let max_area = input.scaled_area(MAX_TEXT_AREA);
        let text_like = find_contours::<i32>(&edges)
            .iter()
            .filter(|contour| contour.parent.is_none())
            .filter(|contour| {
                let points: Vec<(f64, f64)> =
                    contour.points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
                let area = shoelace_area(&points);
                if area <= min_area || area >= max_area {
                    return false;
                }
                let (min_x, max_x) = extent(contour.points.iter().map(|p| p.x));
                let (min_y, max_y) = extent(contour.points.iter().map(|p| p.y));
                let aspect = (max_x - min_x + 1) as f64 / (max_y - min_y + 1) as f64;
                aspect > 0.1 && aspect < 10.0
            })
            .count();

        let mut confidence = (text_like as f64 / CONTOURS_FOR_FULL).min(1.0) as f32;

        let repeats = count_repeats(&close(&edges, Norm::LInf, 2), input);
        if repeats > REPEATS_REQUIRED {
            confidence = confidence.max(REPEAT_CONFIDENCE);
        }
        debug!(text_like, repeats, confidence, "text overlay scored");
        Ok(Detection::new(confidence)
            .with("text_contours", text_like)
            .with("repeated_blocks", repeats))
    }
}

fn extent(values: impl Iterator<Item = i32>) -> (i32, i32) {
    values.fold((i32::MAX, i32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Adjacent block pairs along four horizontal bands whose correlation
/// exceeds the repeat threshold.
fn count_repeats(morph: &image::GrayImage, input: &AnalysisInput<'_>) -> usize {
    let (w, h) = morph.dimensions();
    let block = (input.scaled(BLOCK).round() as u32).max(8);
    if w <= 2 * block || h == 0 {
        return 0;
    }

    let step_y = (h / 4).max(1);
    let mut repeats = 0;
    for y in (0..h).step_by(step_y as usize) {
        let band = block.min(h - y);
        let mut x = 0;
        while x + 2 * block < w {
            if block_correlation(morph, x, x + block, y, block, band) > REPEAT_CORRELATION {
                repeats += 1;
            }
            x += block;
        }
    }
    repeats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::watermark::TemplateLibrary;
    use image::{DynamicImage, GrayImage, Luma};

    fn score(gray: &GrayImage) -> f32 {
        let frame = Frame::new(0, DynamicImage::ImageLuma8(gray.clone()));
        let templates = TemplateLibrary::empty();
        let input = AnalysisInput {
            frame: &frame,
            gray,
            working: gray,
            scale: 1.0,
            templates: &templates,
        };
        TextOverlayDetector.detect(&input).unwrap().confidence
    }

    #[test]
    fn blank_page_scores_zero() {
        assert_eq!(score(&GrayImage::from_pixel(300, 200, Luma([240]))), 0.0);
    }

    /// Dark 20x20 squares every 50 px repeat across the page.
    #[test]
    fn tiled_marks_are_detected() {
        let gray = GrayImage::from_fn(400, 300, |x, y| {
            let inside = (x % 50) >= 15 && (x % 50) < 35 && (y % 50) >= 15 && (y % 50) < 35;
            Luma([if inside { 20 } else { 240 }])
        });
        assert!(score(&gray) >= REPEAT_CONFIDENCE);
    }
}
