// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pattern and logo detection: stable round dark blobs (seals, emblems) across
// a threshold sweep, plus corner density for fine guilloche patterns.

use std::f64::consts::PI;

use image::{GrayImage, Luma};
use imageproc::corners::corners_fast9;
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;
use valid8_core::error::Result;
use valid8_core::types::WatermarkType;

use super::{AnalysisInput, Detection, WatermarkDetector};

/// Threshold sweep for dark blobs.
const BLOB_THRESHOLDS: std::ops::RangeInclusive<u8> = 10..=220;
const BLOB_THRESHOLD_STEP: usize = 30;

/// Blob area range at full resolution, inclusive.
const MIN_BLOB_AREA: f64 = 100.0;
const MAX_BLOB_AREA: f64 = 5000.0;
const MIN_CIRCULARITY: f64 = 0.3;
/// Thresholds a blob must appear at to count.
const MIN_REPEATABILITY: u32 = 2;
/// Centres closer than this (full resolution) belong to the same blob.
const MIN_BLOB_DISTANCE: f64 = 10.0;
/// Diameter above which a blob counts as large.
const LARGE_BLOB_DIAMETER: f64 = 20.0;
const LARGE_BLOBS_FOR_FULL: f64 = 10.0;

const FAST_THRESHOLD: u8 = 20;
const MAX_CORNERS: usize = 100;
const MIN_CORNER_DISTANCE: f64 = 10.0;
/// Corners per 10 000 px above which density contributes.
const CORNER_DENSITY_THRESHOLD: f64 = 5.0;

#[derive(Debug, Default)]
pub struct PatternDetector;

impl WatermarkDetector for PatternDetector {
    fn name(&self) -> &'static str {
        "pattern_watermark"
    }

    fn kind(&self) -> WatermarkType {
        WatermarkType::Pattern
    }

    fn detect(&self, input: &AnalysisInput<'_>) -> Result<Detection> {
        let blobs = stable_blobs(input);
        let large_diameter = input.scaled(LARGE_BLOB_DIAMETER);
        let large = blobs.iter().filter(|b| b.diameter() > large_diameter).count();
        let mut confidence = (large as f64 / LARGE_BLOBS_FOR_FULL).min(1.0);

        let corners = spaced_corners(input);
        let original_area = input.gray.width() as f64 * input.gray.height() as f64;
        let density = if original_area > 0.0 {
            corners as f64 / (original_area / 10_000.0)
        } else {
            0.0
        };
        if density > CORNER_DENSITY_THRESHOLD {
            confidence = confidence.max((density / 20.0).min(0.8));
        }

        debug!(blobs = blobs.len(), large, corners, confidence, "pattern scored");
        Ok(Detection::new(confidence as f32)
            .with("blobs", blobs.len())
            .with("large_blobs", large)
            .with("corners", corners)
            .with("corner_density", density))
    }
}

/// A blob tracked across thresholds.
#[derive(Debug, Clone)]
struct BlobGroup {
    x: f64,
    y: f64,
    area_sum: f64,
    hits: u32,
    last_threshold: u8,
}

impl BlobGroup {
    fn diameter(&self) -> f64 {
        2.0 * (self.area_sum / self.hits as f64 / PI).sqrt()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Component {
    area: u64,
    sum_x: f64,
    sum_y: f64,
    perimeter: u64,
}

/// Round dark blobs found at several thresholds.
fn stable_blobs(input: &AnalysisInput<'_>) -> Vec<BlobGroup> {
    let working = input.working;
    let min_area = input.scaled_area(MIN_BLOB_AREA);
    let max_area = input.scaled_area(MAX_BLOB_AREA);
    let min_distance = input.scaled(MIN_BLOB_DISTANCE).max(2.0);

    let mut groups: Vec<BlobGroup> = Vec::new();
    for threshold in BLOB_THRESHOLDS.step_by(BLOB_THRESHOLD_STEP) {
        for (x, y, area) in dark_components(working, threshold)
            .into_iter()
            .filter(|c| {
                let area = c.area as f64;
                area >= min_area
                    && area <= max_area
                    && c.perimeter > 0
                    && 4.0 * PI * area / (c.perimeter as f64).powi(2) >= MIN_CIRCULARITY
            })
            .map(|c| (c.sum_x / c.area as f64, c.sum_y / c.area as f64, c.area as f64))
        {
            let existing = groups.iter_mut().find(|g| {
                g.last_threshold != threshold && (g.x - x).hypot(g.y - y) < min_distance
            });
            match existing {
                Some(group) => {
                    let hits = group.hits as f64;
                    group.x = (group.x * hits + x) / (hits + 1.0);
                    group.y = (group.y * hits + y) / (hits + 1.0);
                    group.area_sum += area;
                    group.hits += 1;
                    group.last_threshold = threshold;
                }
                None => groups.push(BlobGroup {
                    x,
                    y,
                    area_sum: area,
                    hits: 1,
                    last_threshold: threshold,
                }),
            }
        }
    }

    groups.retain(|g| g.hits >= MIN_REPEATABILITY);
    groups
}

/// Connected components of pixels darker than `threshold`.
fn dark_components(gray: &GrayImage, threshold: u8) -> Vec<Component> {
    let (w, h) = gray.dimensions();
    let binary = GrayImage::from_fn(w, h, |x, y| {
        Luma([if gray.get_pixel(x, y).0[0] < threshold { 255 } else { 0 }])
    });
    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    let count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut components = vec![Component::default(); count + 1];
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label == 0 {
            continue;
        }
        let c = &mut components[label as usize];
        c.area += 1;
        c.sum_x += x as f64;
        c.sum_y += y as f64;
        let on_boundary = x == 0
            || y == 0
            || x + 1 == w
            || y + 1 == h
            || labels.get_pixel(x - 1, y).0[0] != label
            || labels.get_pixel(x + 1, y).0[0] != label
            || labels.get_pixel(x, y - 1).0[0] != label
            || labels.get_pixel(x, y + 1).0[0] != label;
        if on_boundary {
            c.perimeter += 1;
        }
    }
    components.into_iter().skip(1).filter(|c| c.area > 0).collect()
}

/// FAST corners, strongest first, thinned to a minimum spacing and capped.
fn spaced_corners(input: &AnalysisInput<'_>) -> usize {
    let mut corners = corners_fast9(input.working, FAST_THRESHOLD);
    corners.sort_by(|a, b| b.score.total_cmp(&a.score));

    let min_distance = input.scaled(MIN_CORNER_DISTANCE).max(1.0);
    let mut kept: Vec<(f64, f64)> = Vec::new();
    for corner in corners {
        if kept.len() == MAX_CORNERS {
            break;
        }
        let (x, y) = (corner.x as f64, corner.y as f64);
        if kept.iter().all(|(kx, ky)| (kx - x).hypot(ky - y) >= min_distance) {
            kept.push((x, y));
        }
    }
    kept.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::watermark::TemplateLibrary;
    use image::DynamicImage;

    fn input_for<'a>(
        frame: &'a Frame,
        gray: &'a GrayImage,
        templates: &'a TemplateLibrary,
    ) -> AnalysisInput<'a> {
        AnalysisInput {
            frame,
            gray,
            working: gray,
            scale: 1.0,
            templates,
        }
    }

    fn run(gray: GrayImage) -> (f32, usize) {
        let frame = Frame::new(0, DynamicImage::ImageLuma8(gray.clone()));
        let templates = TemplateLibrary::empty();
        let input = input_for(&frame, &gray, &templates);
        (
            PatternDetector.detect(&input).unwrap().confidence,
            stable_blobs(&input).len(),
        )
    }

    /// Twelve dark discs of radius 12 on a light page.
    fn seals() -> GrayImage {
        GrayImage::from_fn(480, 360, |x, y| {
            let (cx, cy) = ((x / 120) * 120 + 60, (y / 120) * 120 + 60);
            let dx = x as f64 - cx as f64;
            let dy = y as f64 - cy as f64;
            Luma([if dx.hypot(dy) <= 12.0 { 20 } else { 240 }])
        })
    }

    #[test]
    fn round_seals_are_detected() {
        let (confidence, blobs) = run(seals());
        assert_eq!(blobs, 12);
        assert_eq!(confidence, 1.0);
    }

    #[test]
    fn thin_lines_are_not_blobs() {
        let gray = GrayImage::from_fn(300, 200, |x, y| {
            Luma([if y % 40 == 0 && x > 20 && x < 280 { 10 } else { 240 }])
        });
        let (_, blobs) = run(gray);
        assert_eq!(blobs, 0);
    }

    #[test]
    fn blank_page_scores_zero() {
        assert_eq!(run(GrayImage::from_pixel(300, 200, Luma([240]))), (0.0, 0));
    }
}
