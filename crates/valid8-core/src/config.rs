// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verifier configuration.
//
// Settings are read from a JSON file (missing keys fall back to their
// defaults) and then individual fields can be overridden through `VALID8_*`
// environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Result, Valid8Error};

/// Scale factors tried for every registered watermark template.
pub const DEFAULT_TEMPLATE_SCALES: [f32; 5] = [0.5, 0.75, 1.0, 1.25, 1.5];

/// Persistent verifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Upper bound for a single oracle call, in milliseconds.
    pub oracle_timeout_ms: u64,
    /// Directory holding reference watermark images.
    pub template_dir: Option<PathBuf>,
    /// Scale factors for multi-scale template matching.
    pub template_scales: Vec<f32>,
    /// Longest side of the working image used by the watermark detectors.
    pub analysis_max_dimension: u32,
    /// Directory containing the OCR detection/recognition models.
    pub ocr_model_dir: Option<PathBuf>,
    /// Record every verification outcome in the audit database.
    pub audit_enabled: bool,
    /// Location of the SQLite audit database.
    pub audit_db_path: Option<PathBuf>,
    /// JSON seed with institutions and known certificate records.
    pub seed_path: Option<PathBuf>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_ms: 10_000,
            template_dir: None,
            template_scales: DEFAULT_TEMPLATE_SCALES.to_vec(),
            analysis_max_dimension: 1024,
            ocr_model_dir: None,
            audit_enabled: true,
            audit_db_path: None,
            seed_path: None,
        }
    }
}

impl VerifierConfig {
    /// Read a config file and apply environment overrides on top.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        debug!("configuration file parsed");
        config.with_env_overrides().validated()
    }

    /// Defaults plus environment overrides, for runs without a config file.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides().validated()
    }

    /// Oracle timeout as a `Duration`.
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    /// Apply `VALID8_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup("VALID8_ORACLE_TIMEOUT_MS") {
            match raw.parse() {
                Ok(ms) => self.oracle_timeout_ms = ms,
                Err(_) => warn!(value = %raw, "ignoring non-numeric VALID8_ORACLE_TIMEOUT_MS"),
            }
        }
        if let Some(raw) = lookup("VALID8_ANALYSIS_MAX_DIMENSION") {
            match raw.parse() {
                Ok(dim) => self.analysis_max_dimension = dim,
                Err(_) => warn!(value = %raw, "ignoring non-numeric VALID8_ANALYSIS_MAX_DIMENSION"),
            }
        }
        if let Some(raw) = lookup("VALID8_AUDIT_ENABLED") {
            self.audit_enabled = matches!(raw.as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(dir) = lookup("VALID8_TEMPLATE_DIR") {
            self.template_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("VALID8_OCR_MODEL_DIR") {
            self.ocr_model_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = lookup("VALID8_AUDIT_DB") {
            self.audit_db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("VALID8_SEED") {
            self.seed_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validated(self) -> Result<Self> {
        if self.oracle_timeout_ms == 0 {
            return Err(Valid8Error::Config(
                "oracle_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.analysis_max_dimension < 64 {
            return Err(Valid8Error::Config(format!(
                "analysis_max_dimension {} is below the 64px minimum",
                self.analysis_max_dimension
            )));
        }
        if self.template_scales.is_empty()
            || self.template_scales.iter().any(|s| !s.is_finite() || *s <= 0.0)
        {
            return Err(Valid8Error::Config(
                "template_scales must be a non-empty list of positive factors".into(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = VerifierConfig::default().validated().unwrap();
        assert_eq!(config.oracle_timeout(), Duration::from_secs(10));
        assert_eq!(config.template_scales, DEFAULT_TEMPLATE_SCALES.to_vec());
    }

    /// Keys missing from the file keep their default values.
    #[test]
    fn load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "oracle_timeout_ms": 2500, "audit_enabled": false }}"#).unwrap();

        let config = VerifierConfig::load(file.path()).unwrap();
        assert_eq!(config.oracle_timeout_ms, 2500);
        assert!(!config.audit_enabled);
        assert_eq!(config.analysis_max_dimension, 1024);
    }

    #[test]
    fn overrides_replace_fields() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("VALID8_ORACLE_TIMEOUT_MS", "750"),
            ("VALID8_AUDIT_ENABLED", "off"),
            ("VALID8_TEMPLATE_DIR", "/srv/watermarks"),
        ]);
        let config = VerifierConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.oracle_timeout_ms, 750);
        assert!(!config.audit_enabled);
        assert_eq!(config.template_dir, Some(PathBuf::from("/srv/watermarks")));
    }

    #[test]
    fn malformed_override_is_ignored() {
        let config = VerifierConfig::default().apply_overrides(|key| {
            (key == "VALID8_ORACLE_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert_eq!(config.oracle_timeout_ms, 10_000);
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = VerifierConfig {
            oracle_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validated(), Err(Valid8Error::Config(_))));
    }
}
