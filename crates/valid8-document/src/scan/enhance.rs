// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement — the preprocessing chain applied to every frame before
// text recognition.
//
// Order matters: blurring before thresholding keeps speckle noise from
// becoming foreground, and closing after thresholding reconnects strokes the
// threshold broke apart.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{grayscale_close, grayscale_open, Mask};
use tracing::{debug, instrument};

/// Frames shorter than this are upscaled before recognition.
pub const MIN_OCR_HEIGHT: u32 = 800;
/// Frames narrower than this are upscaled before recognition.
pub const MIN_OCR_WIDTH: u32 = 600;

/// Sigma matching a 3x3 Gaussian kernel.
const DENOISE_SIGMA: f32 = 0.8;

/// Side of the square structuring element used to close strokes. Two pixels
/// bridges single-pixel breaks and leaves wider gaps between letters alone.
const CLOSE_KERNEL: u32 = 2;

/// Mean intensity below which a binarized page is treated as white-on-black.
const POLARITY_PIVOT: f64 = 127.0;

/// Prepares scanned certificate images for text recognition.
///
/// Each step consumes the enhancer and returns a new one, so the chain reads
/// top to bottom. [`ScanEnhancer::prepare_for_ocr`] runs the whole chain.
pub struct ScanEnhancer {
    /// The working image, grayscale from construction onwards.
    image: GrayImage,
}

impl ScanEnhancer {
    // -- Construction ---------------------------------------------------------

    /// Start from any decoded image; it is converted to grayscale.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self {
            image: image.to_luma8(),
        }
    }

    pub fn from_gray(image: GrayImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_gray(self) -> GrayImage {
        self.image
    }

    // -- Pipeline -------------------------------------------------------------

    /// Run the full chain: upscale, denoise, Otsu binarization, stroke
    /// closing, polarity normalization.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn prepare_for_ocr(self) -> Self {
        let prepared = self
            .upscale_to_minimum(MIN_OCR_WIDTH, MIN_OCR_HEIGHT)
            .denoise(DENOISE_SIGMA)
            .binarize_otsu()
            .close_strokes()
            .normalize_polarity();
        debug!(
            width = prepared.image.width(),
            height = prepared.image.height(),
            "OCR preprocessing complete"
        );
        prepared
    }

    /// Upscale with cubic interpolation when either dimension is below its
    /// minimum, using the larger of the two required ratios.
    pub fn upscale_to_minimum(self, min_width: u32, min_height: u32) -> Self {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 || (width >= min_width && height >= min_height) {
            return self;
        }

        let scale = (min_height as f64 / height as f64).max(min_width as f64 / width as f64);
        let new_width = (width as f64 * scale).round() as u32;
        let new_height = (height as f64 * scale).round() as u32;
        debug!(scale, new_width, new_height, "upscaling small frame");

        Self {
            image: image::imageops::resize(&self.image, new_width, new_height, FilterType::CatmullRom),
        }
    }

    /// Gaussian blur to suppress scanner noise.
    pub fn denoise(self, sigma: f32) -> Self {
        if self.image.width() == 0 || self.image.height() == 0 {
            return self;
        }
        Self {
            image: gaussian_blur_f32(&self.image, sigma),
        }
    }

    /// Global binarization at the Otsu threshold; pixels above it become white.
    pub fn binarize_otsu(self) -> Self {
        let threshold = otsu_threshold(&self.image);
        debug!(threshold, "Otsu threshold computed");

        let mut output = self.image;
        for pixel in output.pixels_mut() {
            pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
        }
        Self { image: output }
    }

    /// Morphological closing of the ink strokes with a 2x2 square. Ink is the
    /// minority colour: on a light page that means opening the white
    /// background.
    pub fn close_strokes(self) -> Self {
        if self.image.width() == 0 || self.image.height() == 0 {
            return self;
        }
        let square = GrayImage::from_pixel(CLOSE_KERNEL, CLOSE_KERNEL, Luma([255]));
        let kernel = Mask::from_image(&square, 0, 0);
        let image = if mean_intensity(&self.image) >= POLARITY_PIVOT {
            grayscale_open(&self.image, &kernel)
        } else {
            grayscale_close(&self.image, &kernel)
        };
        Self { image }
    }

    /// Invert white-on-black pages so text is always dark on light.
    pub fn normalize_polarity(self) -> Self {
        if mean_intensity(&self.image) >= POLARITY_PIVOT {
            return self;
        }
        debug!("inverting white-on-black frame");
        let mut image = self.image;
        image::imageops::invert(&mut image);
        Self { image }
    }
}

// -- Histogram helpers --------------------------------------------------------

/// Mean pixel value; 255 for an empty image.
pub(crate) fn mean_intensity(gray: &GrayImage) -> f64 {
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 255.0;
    }
    let sum: u64 = gray.pixels().map(|Luma([value])| *value as u64).sum();
    sum as f64 / total as f64
}

/// Compute the Otsu threshold for a grayscale image.
///
/// Finds the threshold value that maximises the between-class variance of the
/// dark and light pixel groups. Values at or below the threshold form the dark
/// class.
pub(crate) fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return 128;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = 0.0;
    let mut best_threshold: u8 = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Light page with a dark 20x6 bar in the middle.
    fn page_with_bar(width: u32, height: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([230u8]));
        let (cx, cy) = (width / 2, height / 2);
        for y in cy - 3..cy + 3 {
            for x in cx - 10..cx + 10 {
                img.put_pixel(x, y, Luma([20u8]));
            }
        }
        img
    }

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let threshold = otsu_threshold(&page_with_bar(100, 100));
        assert!((20..230).contains(&threshold), "threshold {threshold}");
    }

    /// Small frames grow by the larger of the two ratios (800/100 here).
    #[test]
    fn upscale_uses_larger_ratio() {
        let enhancer = ScanEnhancer::from_gray(GrayImage::new(300, 100)).upscale_to_minimum(600, 800);
        assert_eq!(enhancer.as_gray().dimensions(), (2400, 800));
    }

    #[test]
    fn large_frames_are_not_resized() {
        let enhancer = ScanEnhancer::from_gray(GrayImage::new(900, 1200)).upscale_to_minimum(600, 800);
        assert_eq!(enhancer.as_gray().dimensions(), (900, 1200));
    }

    #[test]
    fn output_is_binary_dark_on_light() {
        let prepared = ScanEnhancer::from_gray(page_with_bar(120, 100)).prepare_for_ocr();
        let gray = prepared.into_gray();
        assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert!(mean_intensity(&gray) >= POLARITY_PIVOT);
        // The bar survives as ink near the centre.
        let (w, h) = gray.dimensions();
        assert_eq!(gray.get_pixel(w / 2, h / 2).0[0], 0);
    }

    /// A white-on-black scan comes out dark-on-light.
    #[test]
    fn inverted_scan_is_normalized() {
        let mut negative = page_with_bar(120, 100);
        image::imageops::invert(&mut negative);
        let gray = ScanEnhancer::from_gray(negative).prepare_for_ocr().into_gray();
        assert!(mean_intensity(&gray) >= POLARITY_PIVOT);
        let (w, h) = gray.dimensions();
        assert_eq!(gray.get_pixel(w / 2, h / 2).0[0], 0);
    }

    #[test]
    fn empty_image_passes_through() {
        let gray = ScanEnhancer::from_gray(GrayImage::new(0, 0)).prepare_for_ocr().into_gray();
        assert_eq!(gray.dimensions(), (0, 0));
    }

    /// Light page with two dark vertical strokes `gap` pixels apart.
    fn strokes(gap: u32) -> GrayImage {
        GrayImage::from_fn(40, 40, |x, y| {
            let column = (10..=11).contains(&x) || (12 + gap..=13 + gap).contains(&x);
            let ink = (5..=30).contains(&y) && column;
            Luma([if ink { 0 } else { 255 }])
        })
    }

    #[test]
    fn closing_bridges_one_pixel_breaks() {
        let closed = ScanEnhancer::from_gray(strokes(1)).close_strokes().into_gray();
        assert_eq!(closed.get_pixel(12, 20).0[0], 0);
    }

    #[test]
    fn closing_keeps_two_pixel_gaps_open() {
        let closed = ScanEnhancer::from_gray(strokes(2)).close_strokes().into_gray();
        assert_eq!(closed.get_pixel(12, 20).0[0], 255);
        assert_eq!(closed.get_pixel(13, 20).0[0], 255);
        assert_eq!(closed.get_pixel(11, 20).0[0], 0);
        assert_eq!(closed.get_pixel(14, 20).0[0], 0);
    }
}
