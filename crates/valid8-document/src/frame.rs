// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster frames — one decoded page or image of a document.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

/// One decoded raster page of a document. Frames only live for the duration
/// of a verification run.
#[derive(Debug, Clone)]
pub struct Frame {
    page_index: usize,
    image: DynamicImage,
    /// Text drawn as PDF text objects, for pages with nothing to rasterize.
    text_layer: Option<String>,
}

impl Frame {
    pub fn new(page_index: usize, image: DynamicImage) -> Self {
        Self {
            page_index,
            image,
            text_layer: None,
        }
    }

    pub fn with_text_layer(mut self, text: impl Into<String>) -> Self {
        self.text_layer = Some(text.into());
        self
    }

    pub fn text_layer(&self) -> Option<&str> {
        self.text_layer.as_deref()
    }

    /// Zero-based position of the page within its document.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn to_gray(&self) -> GrayImage {
        self.image.to_luma8()
    }

    /// Grayscale copy whose longest side is at most `max_dimension`, plus the
    /// factor applied (1.0 when no downscaling was needed).
    pub fn working_gray(&self, max_dimension: u32) -> (GrayImage, f32) {
        let gray = self.to_gray();
        downscale_to_fit(gray, max_dimension)
    }
}

/// Shrink `image` so its longest side is at most `max_dimension`.
pub(crate) fn downscale_to_fit(image: GrayImage, max_dimension: u32) -> (GrayImage, f32) {
    let longest = image.width().max(image.height());
    if longest <= max_dimension || longest == 0 {
        return (image, 1.0);
    }
    let scale = max_dimension as f32 / longest as f32;
    let width = ((image.width() as f32 * scale).round() as u32).max(1);
    let height = ((image.height() as f32 * scale).round() as u32).max(1);
    let resized = image::imageops::resize(&image, width, height, FilterType::Triangle);
    (resized, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn working_copy_respects_limit() {
        let frame = Frame::new(
            0,
            DynamicImage::ImageLuma8(GrayImage::from_pixel(2000, 1000, Luma([200]))),
        );
        let (gray, scale) = frame.working_gray(500);
        assert_eq!(gray.dimensions(), (500, 250));
        assert!((scale - 0.25).abs() < 1e-6);
    }

    #[test]
    fn small_frames_are_not_resized() {
        let frame = Frame::new(3, DynamicImage::ImageLuma8(GrayImage::new(40, 30)));
        let (gray, scale) = frame.working_gray(500);
        assert_eq!(gray.dimensions(), (40, 30));
        assert_eq!(scale, 1.0);
        assert_eq!(frame.page_index(), 3);
    }
}
