// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Institution directory — the verified institutions, their certificate
// templates and contact details, and the institution API oracle.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument};
use valid8_core::error::Result;
use valid8_core::oracle::{ContactRegistry, EvidenceQuery, Oracle, TemplateRegistry};
use valid8_core::types::{CertificateRecord, ContactInfo, EvidenceResult, EvidenceSource};
use valid8_security::certificate_hash;

use crate::seed::{InstitutionEntry, Seed};

/// Read-only directory of verified institutions.
#[derive(Debug, Clone, Default)]
pub struct InstitutionDirectory {
    entries: Vec<InstitutionEntry>,
}

impl InstitutionDirectory {
    pub fn new(entries: Vec<InstitutionEntry>) -> Self {
        Self { entries }
    }

    pub fn from_seed(seed: &Seed) -> Self {
        Self::new(seed.institutions.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact name (ignoring case) or code.
    pub fn get(&self, name_or_code: &str) -> Option<&InstitutionEntry> {
        let key = name_or_code.trim();
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(key) || e.code.eq_ignore_ascii_case(key))
    }

    /// Best entry for a claimed institution name: an exact match, else the
    /// first entry whose name contains the claim. Blank claims resolve to
    /// nothing.
    pub fn resolve(&self, claimed: &str) -> Option<&InstitutionEntry> {
        let claimed = claimed.trim();
        if claimed.is_empty() {
            return None;
        }
        self.get(claimed).or_else(|| {
            let needle = claimed.to_lowercase();
            self.entries
                .iter()
                .find(|e| e.name.to_lowercase().contains(&needle))
        })
    }
}

impl TemplateRegistry for InstitutionDirectory {
    /// Templates are keyed by the exact institution name.
    fn required_fields(&self, institution: &str) -> Option<BTreeSet<String>> {
        self.get(institution)
            .and_then(|entry| entry.required_fields.clone())
    }
}

impl ContactRegistry for InstitutionDirectory {
    fn contact_info(&self, institution: &str) -> ContactInfo {
        self.resolve(institution)
            .and_then(|entry| entry.contact.clone())
            .unwrap_or_else(ContactInfo::placeholder)
    }
}

/// Asks the issuing institution whether it awarded the claimed certificate.
#[derive(Debug, Clone)]
pub struct InstitutionApiOracle {
    directory: Arc<InstitutionDirectory>,
}

impl InstitutionApiOracle {
    pub fn new(directory: Arc<InstitutionDirectory>) -> Self {
        Self { directory }
    }
}

impl Oracle for InstitutionApiOracle {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::InstitutionApi
    }

    #[instrument(skip_all, fields(institution = %query.claims.institution))]
    fn check(&self, query: &EvidenceQuery) -> Result<EvidenceResult> {
        let claims = &query.claims;
        let Some(entry) = self.directory.resolve(&claims.institution) else {
            return Ok(EvidenceResult::failed(
                self.source(),
                "Institution not found in verified institutions list",
            ));
        };
        if entry.issued.is_empty() {
            return Ok(EvidenceResult::failed(
                self.source(),
                format!("{} does not offer a verification API", entry.name),
            ));
        }

        let holder = claims.student_name.trim().to_lowercase();
        let course = claims.course.to_lowercase();
        let issued = entry.issued.iter().find(|cert| {
            cert.student_name.to_lowercase() == holder
                && course.contains(&cert.course.to_lowercase())
        });
        debug!(code = %entry.code, found = issued.is_some(), "institution API answered");

        Ok(match issued {
            Some(cert) => EvidenceResult::verified(
                self.source(),
                Some(CertificateRecord {
                    student_name: cert.student_name.clone(),
                    course: cert.course.clone(),
                    institution: entry.name.clone(),
                    issue_date: cert.issue_date.clone(),
                    grade: String::new(),
                    certificate_hash: certificate_hash(
                        &cert.student_name,
                        &cert.course,
                        &entry.name,
                        &cert.issue_date,
                    ),
                }),
            ),
            None => EvidenceResult::failed(
                self.source(),
                "Certificate not found in institution database",
            ),
        })
    }
}
