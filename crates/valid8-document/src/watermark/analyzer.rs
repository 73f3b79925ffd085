// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The watermark analyzer: runs every detector in isolation and fuses their
// confidences.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{info, instrument, warn};
use valid8_core::config::VerifierConfig;
use valid8_core::types::{AuthenticityVerdict, MethodResult, WatermarkType};

use super::{
    AlphaChannelDetector, AnalysisInput, FrequencyDetector, PatternDetector, TemplateDetector,
    TemplateLibrary, TextOverlayDetector, WatermarkDetector,
};
use crate::frame::Frame;

/// Fused confidence above which a watermark is reported.
pub const WATERMARK_THRESHOLD: f32 = 0.3;

/// Runs an ordered list of detectors over a frame.
pub struct WatermarkAnalyzer {
    detectors: Vec<Box<dyn WatermarkDetector>>,
    max_dimension: u32,
}

impl WatermarkAnalyzer {
    /// The five standard detectors, in fusion order.
    pub fn new(max_dimension: u32) -> Self {
        Self::with_detectors(
            vec![
                Box::new(TemplateDetector::default()),
                Box::new(FrequencyDetector),
                Box::new(TextOverlayDetector),
                Box::new(PatternDetector),
                Box::new(AlphaChannelDetector),
            ],
            max_dimension,
        )
    }

    pub fn from_config(config: &VerifierConfig) -> Self {
        let mut analyzer = Self::new(config.analysis_max_dimension);
        analyzer.detectors[0] = Box::new(TemplateDetector::new(config.template_scales.clone()));
        analyzer
    }

    /// A custom detector list. Order decides which type wins a tie.
    pub fn with_detectors(detectors: Vec<Box<dyn WatermarkDetector>>, max_dimension: u32) -> Self {
        Self {
            detectors,
            max_dimension,
        }
    }

    /// Score `frame` with every detector. Never fails: a detector that errors
    /// or panics scores 0 and its error is kept in the method map.
    #[instrument(skip_all, fields(page = frame.page_index(), width = frame.width(), height = frame.height()))]
    pub fn analyze(&self, frame: &Frame, templates: &TemplateLibrary) -> AuthenticityVerdict {
        let gray = frame.to_gray();
        let (working, scale) = frame.working_gray(self.max_dimension);
        let input = AnalysisInput {
            frame,
            gray: &gray,
            working: &working,
            scale,
            templates,
        };

        let results: Vec<(&'static str, WatermarkType, MethodResult)> = self
            .detectors
            .iter()
            .map(|detector| {
                (detector.name(), detector.kind(), run_isolated(detector.as_ref(), &input, frame))
            })
            .collect();

        let verdict = fuse(results);
        info!(
            has_watermark = verdict.has_watermark,
            watermark_type = ?verdict.watermark_type,
            confidence = verdict.confidence,
            "authenticity analyzed"
        );
        verdict
    }
}

fn run_isolated(detector: &dyn WatermarkDetector, input: &AnalysisInput<'_>, frame: &Frame) -> MethodResult {
    if frame.is_empty() {
        return failed("frame has no pixels".into());
    }

    match catch_unwind(AssertUnwindSafe(|| detector.detect(input))) {
        Ok(Ok(detection)) => MethodResult {
            confidence: if detection.confidence.is_finite() {
                detection.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            error: None,
            details: detection.details,
        },
        Ok(Err(err)) => {
            warn!(detector = detector.name(), error = %err, "detector failed");
            failed(err.to_string())
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "detector panicked".to_owned());
            warn!(detector = detector.name(), panic = %message, "detector panicked");
            failed(format!("panic: {message}"))
        }
    }
}

fn failed(error: String) -> MethodResult {
    MethodResult {
        confidence: 0.0,
        error: Some(error),
        details: BTreeMap::new(),
    }
}

/// Max fusion. The type is the first method, in order, that reaches the
/// maximum, and `None` when the maximum does not clear the threshold.
pub fn fuse(results: Vec<(&'static str, WatermarkType, MethodResult)>) -> AuthenticityVerdict {
    let confidence = results
        .iter()
        .map(|(_, _, r)| r.confidence)
        .fold(0.0f32, f32::max);
    let has_watermark = confidence > WATERMARK_THRESHOLD;
    let watermark_type = if has_watermark {
        results
            .iter()
            .find(|(_, _, r)| r.confidence == confidence)
            .map(|(_, kind, _)| *kind)
            .unwrap_or_default()
    } else {
        WatermarkType::None
    };

    let methods: BTreeMap<String, MethodResult> = results
        .into_iter()
        .map(|(name, _, result)| (name.to_owned(), result))
        .collect();

    AuthenticityVerdict {
        has_watermark,
        watermark_type,
        confidence,
        methods,
    }
}
