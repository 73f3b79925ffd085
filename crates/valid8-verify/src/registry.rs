// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Internal certificate registry and the two oracles backed by it: the
// direct-link lookup (by fingerprint) and the claims lookup (by name,
// institution and course).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};
use valid8_core::error::Result;
use valid8_core::oracle::{EvidenceQuery, Oracle};
use valid8_core::types::{CertificateRecord, ClaimsRecord, EvidenceResult, EvidenceSource};
use valid8_security::record_hash;

/// Path segment that precedes the fingerprint in a verification link.
const VERIFY_SEGMENT: &str = "/verify/";

/// Certificates known to this deployment, indexed by fingerprint.
#[derive(Debug, Clone, Default)]
pub struct CertificateRegistry {
    records: Vec<CertificateRecord>,
    by_hash: HashMap<String, usize>,
}

impl CertificateRegistry {
    /// Build the registry. Records without a fingerprint get one computed
    /// from their holder, course, institution and issue date.
    pub fn new(records: impl IntoIterator<Item = CertificateRecord>) -> Self {
        let mut registry = Self::default();
        for mut record in records {
            if record.certificate_hash.trim().is_empty() {
                record.certificate_hash = record_hash(&record);
            }
            registry
                .by_hash
                .insert(record.certificate_hash.to_ascii_lowercase(), registry.records.len());
            registry.records.push(record);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CertificateRecord] {
        &self.records
    }

    pub fn find_by_hash(&self, hash: &str) -> Option<&CertificateRecord> {
        self.by_hash
            .get(&hash.trim().to_ascii_lowercase())
            .map(|&index| &self.records[index])
    }

    /// First record whose name, institution and course each contain the
    /// claimed value, ignoring case. Claims missing any of the three never
    /// match.
    pub fn find_matching(&self, claims: &ClaimsRecord) -> Option<&CertificateRecord> {
        let wanted = [
            claims.student_name.trim(),
            claims.institution.trim(),
            claims.course.trim(),
        ];
        if wanted.iter().any(|value| value.is_empty()) {
            return None;
        }
        let [name, institution, course] = wanted.map(str::to_lowercase);

        self.records.iter().find(|record| {
            record.student_name.to_lowercase().contains(&name)
                && record.institution.to_lowercase().contains(&institution)
                && record.course.to_lowercase().contains(&course)
        })
    }
}

/// The fingerprint carried by a verification link, e.g.
/// `https://registry.example/verify/<hash>?src=qr`.
pub fn link_fingerprint(reference: &str) -> Option<&str> {
    let (_, tail) = reference.rsplit_once(VERIFY_SEGMENT)?;
    let hash = tail
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .trim();
    (!hash.is_empty()).then_some(hash)
}

// ---------------------------------------------------------------------------
// Oracles
// ---------------------------------------------------------------------------

/// Resolves the verification link supplied with an upload.
#[derive(Debug, Clone)]
pub struct LinkOracle {
    registry: Arc<CertificateRegistry>,
}

impl LinkOracle {
    pub fn new(registry: Arc<CertificateRegistry>) -> Self {
        Self { registry }
    }
}

impl Oracle for LinkOracle {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::LinkRegistry
    }

    #[instrument(skip_all)]
    fn check(&self, query: &EvidenceQuery) -> Result<EvidenceResult> {
        let Some(reference) = query.reference.as_deref() else {
            return Ok(EvidenceResult::not_applicable(self.source()));
        };

        let record = link_fingerprint(reference).and_then(|hash| self.registry.find_by_hash(hash));
        debug!(found = record.is_some(), "verification link resolved");
        Ok(match record {
            Some(record) => EvidenceResult::verified(self.source(), Some(record.clone())),
            None => EvidenceResult::failed(
                self.source(),
                "Invalid verification link or certificate not found",
            ),
        })
    }
}

/// Looks the extracted claims up in the internal registry.
#[derive(Debug, Clone)]
pub struct RecordLookupOracle {
    registry: Arc<CertificateRegistry>,
}

impl RecordLookupOracle {
    pub fn new(registry: Arc<CertificateRegistry>) -> Self {
        Self { registry }
    }
}

impl Oracle for RecordLookupOracle {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::RecordLookup
    }

    #[instrument(skip_all, fields(records = self.registry.len()))]
    fn check(&self, query: &EvidenceQuery) -> Result<EvidenceResult> {
        Ok(match self.registry.find_matching(&query.claims) {
            Some(record) => {
                debug!(hash = %record.certificate_hash, "claims matched a stored record");
                EvidenceResult::verified(self.source(), Some(record.clone()))
            }
            None => EvidenceResult::not_verified(self.source()),
        })
    }
}
