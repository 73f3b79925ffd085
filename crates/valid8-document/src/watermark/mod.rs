// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark and authenticity analysis.
//
// Five independent detectors each score a frame in [0, 1]; the analyzer keeps
// the maximum. Detectors see a downscaled working copy of the frame plus the
// scale factor, so size thresholds written for full-resolution scans are
// scaled before use.

pub mod alpha;
pub mod analyzer;
pub mod frequency;
pub mod overlay;
pub mod pattern;
pub(crate) mod stats;
pub mod template;

use std::collections::BTreeMap;

use image::GrayImage;
use serde_json::Value;
use valid8_core::error::Result;
use valid8_core::types::WatermarkType;

use crate::frame::Frame;

pub use alpha::AlphaChannelDetector;
pub use analyzer::{fuse, WatermarkAnalyzer, WATERMARK_THRESHOLD};
pub use frequency::FrequencyDetector;
pub use overlay::TextOverlayDetector;
pub use pattern::PatternDetector;
pub use template::{TemplateDetector, TemplateLibrary, WatermarkTemplate};

/// What a detector gets to look at.
pub struct AnalysisInput<'a> {
    /// The original frame, colour and alpha intact.
    pub frame: &'a Frame,
    /// Full-resolution grayscale.
    pub gray: &'a GrayImage,
    /// Grayscale whose longest side is at most the analysis limit.
    pub working: &'a GrayImage,
    /// `working` size divided by `gray` size (1.0 when not downscaled).
    pub scale: f32,
    pub templates: &'a TemplateLibrary,
}

impl AnalysisInput<'_> {
    /// Scale a full-resolution length to the working copy.
    pub fn scaled(&self, length: f64) -> f64 {
        length * self.scale as f64
    }

    /// Scale a full-resolution area to the working copy.
    pub fn scaled_area(&self, area: f64) -> f64 {
        area * (self.scale as f64).powi(2)
    }
}

/// A detector's score and the measurements it was derived from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub confidence: f32,
    pub details: BTreeMap<String, Value>,
}

impl Detection {
    pub fn new(confidence: f32) -> Self {
        Self {
            confidence,
            details: BTreeMap::new(),
        }
    }

    /// Record one measurement under `key`.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_owned(), value.into());
        self
    }
}

impl From<f32> for Detection {
    fn from(confidence: f32) -> Self {
        Self::new(confidence)
    }
}

/// One watermark detection method.
pub trait WatermarkDetector: Send + Sync {
    /// Key under which the method's result is reported.
    fn name(&self) -> &'static str;

    /// Watermark type reported when this method wins the fusion.
    fn kind(&self) -> WatermarkType;

    /// Confidence in [0, 1] that the frame carries this kind of watermark,
    /// with whatever counts or matches backed it.
    fn detect(&self, input: &AnalysisInput<'_>) -> Result<Detection>;
}
