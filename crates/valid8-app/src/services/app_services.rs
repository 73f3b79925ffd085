// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — builds the verifier and the audit log from the
// configuration. Call `AppServices::init` once per process; model loading
// and template decoding happen there.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use valid8_core::config::VerifierConfig;
use valid8_core::error::Result;
use valid8_core::outcome::VerificationOutcome;
use valid8_document::{TemplateLibrary, TextRecognizer};
use valid8_security::AuditLog;
use valid8_verify::{Seed, VerificationRequest, Verifier};

use super::data_dir::{self, DataLayout};

pub struct AppServices {
    verifier: Verifier,
    audit_log: Option<Arc<AuditLog>>,
}

impl AppServices {
    /// Load the seed, templates, OCR models and (when enabled) the audit
    /// database. `seed_path` takes precedence over the configured seed, which
    /// takes precedence over `seed.json` in the data directory.
    pub fn init(config: &VerifierConfig, seed_path: Option<&Path>, audit: bool) -> Result<Self> {
        let layout = DataLayout::from_env();
        let seed_path = seed_path
            .map(Path::to_path_buf)
            .or_else(|| config.seed_path.clone())
            .or_else(|| layout.seed());
        let seed = match seed_path {
            Some(path) => Seed::load(path)?,
            None => {
                warn!("no seed configured; registry and institution checks have nothing to match");
                Seed::default()
            }
        };

        let templates = TemplateLibrary::load_dir(template_dir(config, &layout))?;
        let audit_log = if audit && config.audit_enabled {
            Some(Arc::new(open_audit_log(config, &layout)?))
        } else {
            None
        };

        let mut builder = Verifier::builder(recognizer(config)?)
            .config(config)
            .templates(templates)
            .seed(&seed);

        let signatures = seed.signature_oracle()?;
        if signatures.trusted_signers() > 0 {
            builder = builder.signature_oracle(signatures);
        }
        if let Some(log) = &audit_log {
            builder = builder.sink(log.clone());
        }

        info!(
            institutions = seed.institutions.len(),
            certificates = seed.certificates.len(),
            audit = audit_log.is_some(),
            data_dir = %layout.root().display(),
            "app services initialised"
        );
        Ok(Self {
            verifier: builder.build()?,
            audit_log,
        })
    }

    pub async fn verify(&self, request: VerificationRequest) -> VerificationOutcome {
        self.verifier.verify(request).await
    }

    pub fn audit_log(&self) -> Option<&AuditLog> {
        self.audit_log.as_deref()
    }
}

/// The configured template directory, or `templates/` in the data directory.
pub fn template_dir(config: &VerifierConfig, layout: &DataLayout) -> PathBuf {
    config
        .template_dir
        .clone()
        .unwrap_or_else(|| layout.templates())
}

/// Open the configured audit database, or `audit.db` in the data directory.
pub fn open_audit_log(config: &VerifierConfig, layout: &DataLayout) -> Result<AuditLog> {
    let path = config
        .audit_db_path
        .clone()
        .unwrap_or_else(|| layout.audit_db());
    data_dir::ensure_parent(&path)?;
    AuditLog::open(path)
}

#[cfg(feature = "ocr")]
fn recognizer(config: &VerifierConfig) -> Result<Arc<dyn TextRecognizer>> {
    use valid8_document::{OcrConfig, OcrsRecognizer};

    let ocr = OcrConfig::from_optional_dir(config.ocr_model_dir.as_deref());
    Ok(Arc::new(OcrsRecognizer::new(&ocr)?))
}

#[cfg(not(feature = "ocr"))]
fn recognizer(_config: &VerifierConfig) -> Result<Arc<dyn TextRecognizer>> {
    Err(valid8_core::error::Valid8Error::Config(
        "valid8 was built without the `ocr` feature; text extraction is unavailable".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use valid8_core::oracle::{ContactRegistry, TemplateRegistry};
    use valid8_verify::InstitutionDirectory;

    const DEMO_SEED: &str = include_str!("../../seed/demo.json");

    #[test]
    fn demo_seed_describes_three_institutions() {
        let seed = Seed::from_json(DEMO_SEED).unwrap();
        assert_eq!(seed.institutions.len(), 3);
        assert_eq!(seed.certificates.len(), 3);

        let directory = InstitutionDirectory::from_seed(&seed);
        assert_eq!(directory.required_fields("Business College").unwrap().len(), 3);
        assert_eq!(directory.contact_info("Medical").phone, "+91-7654321098");
        assert_eq!(seed.signature_oracle().unwrap().trusted_signers(), 0);
    }

    #[test]
    fn audit_log_opens_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = VerifierConfig {
            audit_db_path: Some(dir.path().join("attempts.db")),
            ..Default::default()
        };
        let log = open_audit_log(&config, &DataLayout::at(dir.path().join("unused"))).unwrap();
        assert_eq!(log.count().unwrap(), 0);
        assert!(dir.path().join("attempts.db").exists());
    }

    #[test]
    fn unset_paths_fall_back_to_the_layout() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::at(dir.path().join("data"));
        let config = VerifierConfig::default();

        assert_eq!(template_dir(&config, &layout), dir.path().join("data").join("templates"));
        open_audit_log(&config, &layout).unwrap();
        assert!(dir.path().join("data").join("audit.db").exists());
    }
}
