// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Neural OCR backend built on the `ocrs` crate, with models executed by `rten`.
//
// # Feature Gate
//
// Only compiled with the `ocr` feature:
//
// ```toml
// valid8-document = { path = "crates/valid8-document", features = ["ocr"] }
// ```
//
// # Model Setup
//
// Two model files are required:
//
// - `text-detection.rten` locates word regions.
// - `text-recognition.rten` decodes the characters of each line.
//
// Running `ocrs-cli` once downloads both into `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is the default directory used here.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};
use valid8_core::error::{Result, Valid8Error};

use crate::scan::extract::{RecognizedLine, RecognizedWord, TextRecognizer};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to find the two model files.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Both models inside `dir`, under their well-known file names.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn from_paths(
        detection_model: impl Into<PathBuf>,
        recognition_model: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detection_model_path: detection_model.into(),
            recognition_model_path: recognition_model.into(),
        }
    }

    /// `from_dir` when a directory is configured, the cache default otherwise.
    pub fn from_optional_dir(dir: Option<&Path>) -> Self {
        dir.map(Self::from_dir).unwrap_or_default()
    }

    /// Check that both model files exist.
    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(Valid8Error::Config(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// [`TextRecognizer`] backed by the `ocrs` detection and recognition models.
///
/// Model loading is the expensive part; build one per process and share it.
pub struct OcrsRecognizer {
    engine: OcrsEngine,
}

impl OcrsRecognizer {
    /// Load both models named by `config`.
    ///
    /// # Errors
    ///
    /// [`Valid8Error::Config`] when a model file is missing,
    /// [`Valid8Error::ExtractionFailed`] when one cannot be loaded.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: &OcrConfig) -> Result<Self> {
        config.validate()?;

        info!("loading OCR detection model");
        let detection_model = Model::load_file(&config.detection_model_path).map_err(|err| {
            Valid8Error::ExtractionFailed(format!(
                "failed to load detection model from {}: {}",
                config.detection_model_path.display(),
                err
            ))
        })?;

        info!("loading OCR recognition model");
        let recognition_model =
            Model::load_file(&config.recognition_model_path).map_err(|err| {
                Valid8Error::ExtractionFailed(format!(
                    "failed to load recognition model from {}: {}",
                    config.recognition_model_path.display(),
                    err
                ))
            })?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            Valid8Error::ExtractionFailed(format!("failed to initialise OCR engine: {}", err))
        })?;

        info!("OCR engine ready");
        Ok(Self { engine })
    }
}

impl TextRecognizer for OcrsRecognizer {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &GrayImage) -> Result<Vec<RecognizedLine>> {
        let rgb = DynamicImage::ImageLuma8(image.clone()).to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            Valid8Error::ExtractionFailed(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;

        let input = self.engine.prepare_input(source).map_err(|err| {
            Valid8Error::ExtractionFailed(format!("OCR input preparation failed: {}", err))
        })?;

        let word_rects = self.engine.detect_words(&input).map_err(|err| {
            Valid8Error::ExtractionFailed(format!("word detection failed: {}", err))
        })?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        debug!(words = word_rects.len(), lines = line_rects.len(), "layout detected");

        let line_texts = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| {
                Valid8Error::ExtractionFailed(format!("line recognition failed: {}", err))
            })?;

        let lines: Vec<RecognizedLine> = line_texts
            .iter()
            .flatten()
            .map(|line| line_from_text(&line.to_string()))
            .filter(|line| !line.words.is_empty())
            .collect();

        debug!(lines = lines.len(), "recognition complete");
        Ok(lines)
    }
}

/// Split recognized line text into scored words.
fn line_from_text(text: &str) -> RecognizedLine {
    RecognizedLine::new(
        text.split_whitespace()
            .map(|word| RecognizedWord::new(word, charset_confidence(word)))
            .collect(),
    )
}

/// Share of characters a certificate plausibly contains, scaled to 0..=100.
/// `ocrs` reports no per-word probabilities, so this stands in for one.
fn charset_confidence(word: &str) -> f32 {
    let total = word.chars().count();
    if total == 0 {
        return 0.0;
    }
    let plausible = word
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || ".,()-'&/:".contains(*c))
        .count();
    plausible as f32 / total as f32 * 100.0
}
