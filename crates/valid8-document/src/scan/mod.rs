// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — OCR preprocessing, text extraction, and the optional
// neural recognizer backend.

pub mod enhance;
pub mod extract;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use enhance::ScanEnhancer;
pub use extract::{
    DocumentText, RawText, RecognizedLine, RecognizedWord, TextExtractor, TextRecognizer,
};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrsRecognizer};
