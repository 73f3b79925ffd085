// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification flags raised by the pipeline.
//
// Each flag maps to a severity and a plain-language description so that
// reviewers reading an outcome (or an audit row) can tell what went wrong
// without consulting the step reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Valid8Error;

/// How seriously a reviewer should treat a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    /// The run itself failed; the verdict cannot be trusted.
    Critical,
}

/// Issues raised while verifying a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagCode {
    OcrExtractionFailed,
    TemplateMismatch,
    SignatureInvalid,
    ProcessingError,
}

impl FlagCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OcrExtractionFailed => "OCR_EXTRACTION_FAILED",
            Self::TemplateMismatch => "TEMPLATE_MISMATCH",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::ProcessingError => "PROCESSING_ERROR",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::OcrExtractionFailed => Severity::High,
            Self::TemplateMismatch => Severity::Medium,
            Self::SignatureInvalid => Severity::High,
            Self::ProcessingError => Severity::Critical,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::OcrExtractionFailed => {
                "No text could be read from the document. Ask for a clearer scan or the original PDF."
            }
            Self::TemplateMismatch => {
                "The certificate is missing fields the issuing institution always prints."
            }
            Self::SignatureInvalid => {
                "The attached digital signature does not match the document or its claimed signer."
            }
            Self::ProcessingError => {
                "Verification stopped on an internal error. The result is incomplete."
            }
        }
    }

    /// The flag a hard pipeline error should raise.
    pub fn for_error(err: &Valid8Error) -> Self {
        match err {
            Valid8Error::UnsupportedFormat(_)
            | Valid8Error::CorruptInput(_)
            | Valid8Error::ExtractionFailed(_) => Self::OcrExtractionFailed,
            Valid8Error::Signature(_) => Self::SignatureInvalid,
            _ => Self::ProcessingError,
        }
    }
}

impl fmt::Display for FlagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
