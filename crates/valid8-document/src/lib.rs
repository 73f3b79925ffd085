// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// valid8-document — Everything that looks at document pixels.
//
// Decodes uploads into raster frames (images and PDFs), prepares frames for
// text recognition, extracts text through a pluggable recognizer, parses the
// text into structured claims, and scores frames for watermarks.

pub mod fields;
pub mod frame;
pub mod loader;
pub mod pdf;
pub mod scan;
pub mod watermark;

pub use fields::{assess_quality, ExtractionQuality, FieldParser};
pub use frame::Frame;
pub use loader::DocumentLoader;
pub use pdf::PdfReader;
pub use scan::{
    DocumentText, RawText, RecognizedLine, RecognizedWord, ScanEnhancer, TextExtractor,
    TextRecognizer,
};
pub use watermark::{TemplateLibrary, WatermarkAnalyzer, WatermarkDetector};

#[cfg(feature = "ocr")]
pub use scan::{OcrConfig, OcrsRecognizer};
