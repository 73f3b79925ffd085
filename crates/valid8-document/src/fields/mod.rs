// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structured field extraction from recognized certificate text.

pub mod parser;
pub mod quality;
pub mod rules;

pub use parser::FieldParser;
pub use quality::{assess_quality, ExtractionQuality};
