// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Known watermark templates and the multi-scale template matcher.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat};
use imageproc::template_matching::{match_template, MatchTemplateMethod};
use tracing::{debug, info, instrument, warn};
use valid8_core::config::DEFAULT_TEMPLATE_SCALES;
use valid8_core::error::{Result, Valid8Error};
use valid8_core::types::WatermarkType;

use super::stats::SummedArea;
use super::{AnalysisInput, Detection, WatermarkDetector};
use crate::frame::downscale_to_fit;

/// File extensions picked up by [`TemplateLibrary::load_dir`].
const TEMPLATE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Longest side of the image the matcher slides templates over. Matching is
/// quadratic in both image and template size, so it runs coarser than the
/// other detectors.
const MATCH_MAX_DIMENSION: u32 = 320;

/// A known watermark image.
#[derive(Debug, Clone)]
pub struct WatermarkTemplate {
    pub name: String,
    pub image: GrayImage,
}

/// The registered watermark templates, optionally backed by a directory.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    dir: Option<PathBuf>,
    templates: Vec<WatermarkTemplate>,
}

impl TemplateLibrary {
    /// A library with no templates and no backing directory.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every png/jpg/jpeg in `dir`, ordered by file name. A missing
    /// directory is created and yields an empty library; unreadable images are
    /// skipped with a warning.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|err| {
            Valid8Error::Template(format!(
                "cannot create template directory {}: {}",
                dir.display(),
                err
            ))
        })?;

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_template_extension(path))
            .collect();
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            match image::open(&path) {
                Ok(image) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    templates.push(WatermarkTemplate {
                        name,
                        image: image.to_luma8(),
                    });
                }
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable template"),
            }
        }

        info!(count = templates.len(), "watermark templates loaded");
        Ok(Self {
            dir: Some(dir.to_path_buf()),
            templates,
        })
    }

    /// Add an in-memory template.
    pub fn register(&mut self, name: impl Into<String>, image: GrayImage) {
        self.templates.push(WatermarkTemplate {
            name: name.into(),
            image,
        });
    }

    /// Persist `image` as `<name>.png` in the backing directory and register
    /// it. Returns the written path.
    ///
    /// # Errors
    ///
    /// [`Valid8Error::Template`] when the library has no directory, the name
    /// is not a plain file stem, or the image cannot be written.
    #[instrument(skip(self, image))]
    pub fn save_template(&mut self, name: &str, image: &DynamicImage) -> Result<PathBuf> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| Valid8Error::Template("template library has no directory".into()))?;

        let stem = name.trim();
        if stem.is_empty() || stem.contains(['/', '\\']) || stem.starts_with('.') {
            return Err(Valid8Error::Template(format!("invalid template name {name:?}")));
        }

        let file_name = format!("{stem}.png");
        let path = dir.join(&file_name);
        let gray = image.to_luma8();
        gray.save_with_format(&path, ImageFormat::Png).map_err(|err| {
            Valid8Error::Template(format!("failed to write {}: {}", path.display(), err))
        })?;

        info!(path = %path.display(), "watermark template saved");
        self.register(file_name, gray);
        Ok(path)
    }

    pub fn templates(&self) -> &[WatermarkTemplate] {
        &self.templates
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn has_template_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Multi-scale normalized cross-correlation against every known template.
pub struct TemplateDetector {
    scales: Vec<f32>,
}

impl TemplateDetector {
    pub fn new(scales: Vec<f32>) -> Self {
        Self { scales }
    }
}

impl Default for TemplateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE_SCALES.to_vec())
    }
}

impl WatermarkDetector for TemplateDetector {
    fn name(&self) -> &'static str {
        "template_matching"
    }

    fn kind(&self) -> WatermarkType {
        WatermarkType::Template
    }

    fn detect(&self, input: &AnalysisInput<'_>) -> Result<Detection> {
        if input.templates.is_empty() {
            return Ok(Detection::new(0.0).with("templates", 0));
        }

        let (image, match_scale) = downscale_to_fit(input.working.clone(), MATCH_MAX_DIMENSION);
        let total_scale = input.scale * match_scale;
        let table = SummedArea::new(&image);

        let mut best: Option<(f64, &str, f32, (u32, u32))> = None;
        for template in input.templates.templates() {
            for &scale in &self.scales {
                let factor = scale * total_scale;
                let width = (template.image.width() as f32 * factor).round() as u32;
                let height = (template.image.height() as f32 * factor).round() as u32;
                if width == 0 || height == 0 || width > image.width() || height > image.height() {
                    continue;
                }
                let resized =
                    image::imageops::resize(&template.image, width, height, FilterType::Triangle);
                let Some((score, (x, y))) = best_ccoeff_normed(&image, &table, &resized) else {
                    continue;
                };
                debug!(template = %template.name, scale, score, "template scored");
                if best.map_or(true, |(top, ..)| score > top) {
                    best = Some((score, template.name.as_str(), scale, (x, y)));
                }
            }
        }

        let mut detection = Detection::new(0.0).with("templates", input.templates.len());
        if let Some((score, name, scale, (x, y))) = best {
            // Report the location in full-resolution page pixels.
            let to_page = |v: u32| (v as f32 / total_scale).round() as u64;
            detection.confidence = score.max(0.0) as f32;
            detection = detection
                .with("template", name)
                .with("template_scale", scale)
                .with("match_x", to_page(x))
                .with("match_y", to_page(y));
        }
        Ok(detection)
    }
}

/// Best mean-subtracted normalized correlation of `template` over `image`
/// and the top-left corner where it occurs. `None` when the template or
/// every window is flat.
///
/// Built from the raw cross-correlation plus window sums:
/// `num = Σ(I·T) − ΣI·mean(T)`, `den = sqrt(varI · varT)` with both variances
/// taken as sums of squared deviations.
fn best_ccoeff_normed(
    image: &GrayImage,
    table: &SummedArea,
    template: &GrayImage,
) -> Option<(f64, (u32, u32))> {
    let (tw, th) = template.dimensions();
    let n = (tw * th) as f64;
    let (t_sum, t_sq) = template.pixels().fold((0.0f64, 0.0f64), |(s, q), p| {
        let v = p.0[0] as f64;
        (s + v, q + v * v)
    });
    let t_mean = t_sum / n;
    let t_var = t_sq - t_sum * t_mean;
    if t_var <= f64::EPSILON {
        return None;
    }

    let cross = match_template(image, template, MatchTemplateMethod::CrossCorrelation);
    let mut best: Option<(f64, (u32, u32))> = None;
    for (x, y, value) in cross.enumerate_pixels() {
        let (i_sum, i_sq) = table.window(x, y, tw, th);
        let i_var = i_sq - i_sum * i_sum / n;
        if i_var <= f64::EPSILON {
            continue;
        }
        let num = value.0[0] as f64 - i_sum * t_mean;
        let score = (num / (i_var * t_var).sqrt()).clamp(-1.0, 1.0);
        if best.map_or(true, |(top, _)| score > top) {
            best = Some((score, (x, y)));
        }
    }
    best
}
