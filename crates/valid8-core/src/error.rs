// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for valid8.

use thiserror::Error;

/// Top-level error type for all valid8 operations.
#[derive(Debug, Error)]
pub enum Valid8Error {
    // -- Loader errors --
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt input: {0}")]
    CorruptInput(String),

    // -- Extraction errors --
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    // -- Evidence errors --
    #[error("oracle {oracle} timed out after {timeout_ms} ms")]
    OracleTimeout { oracle: String, timeout_ms: u64 },

    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    // -- Analysis / support --
    #[error("watermark detector failed: {0}")]
    Detector(String),

    #[error("watermark template error: {0}")]
    Template(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Catch-all --
    #[error("processing error: {0}")]
    ProcessingError(String),
}

impl Valid8Error {
    /// Whether this error came from an evidence oracle and should degrade
    /// to a non-verifying result instead of failing the run.
    pub fn is_oracle_failure(&self) -> bool {
        matches!(
            self,
            Self::OracleTimeout { .. } | Self::OracleUnavailable(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, Valid8Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_failures_are_classified() {
        let timeout = Valid8Error::OracleTimeout {
            oracle: "institution_api".into(),
            timeout_ms: 250,
        };
        assert!(timeout.is_oracle_failure());
        assert_eq!(
            timeout.to_string(),
            "oracle institution_api timed out after 250 ms"
        );
        assert!(Valid8Error::OracleUnavailable("offline".into()).is_oracle_failure());
        assert!(!Valid8Error::CorruptInput("truncated".into()).is_oracle_failure());
    }
}
