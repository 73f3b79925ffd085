// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator contracts consumed by the verification pipeline.
//
// Every evidence source (link registry, signature check, record lookup,
// institution API) implements [`Oracle`]. Registries that only answer
// lookups implement the narrower [`TemplateRegistry`] and [`ContactRegistry`]
// traits, and persistence hangs off [`OutcomeSink`].

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::outcome::VerificationOutcome;
use crate::types::{ClaimsRecord, ContactInfo, Document, EvidenceResult, EvidenceSource, SignatureEnvelope};

/// Everything an oracle may look at. Oracles receive it by shared reference
/// and cannot alter the claims.
#[derive(Debug, Clone)]
pub struct EvidenceQuery {
    pub claims: ClaimsRecord,
    /// Verification link or registry reference supplied with the upload.
    pub reference: Option<String>,
    pub signature: Option<SignatureEnvelope>,
    pub document: Arc<Document>,
}

impl EvidenceQuery {
    pub fn new(document: Arc<Document>, claims: ClaimsRecord) -> Self {
        Self {
            claims,
            reference: None,
            signature: None,
            document,
        }
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_signature(mut self, signature: Option<SignatureEnvelope>) -> Self {
        self.signature = signature;
        self
    }
}

/// A source of evidence about a certificate.
///
/// Implementations may block (disk or network); the orchestrator runs them
/// on the blocking pool under a timeout. Returning `Err` is treated the same
/// as an unverified result carrying the error text.
pub trait Oracle: Send + Sync {
    fn source(&self) -> EvidenceSource;

    fn check(&self, query: &EvidenceQuery) -> Result<EvidenceResult>;
}

/// Lookup of the fields an institution always prints on its certificates.
pub trait TemplateRegistry: Send + Sync {
    /// `None` when the institution has no registered template.
    fn required_fields(&self, institution: &str) -> Option<BTreeSet<String>>;
}

/// Lookup of institution contact details for manual verification.
pub trait ContactRegistry: Send + Sync {
    /// Must return [`ContactInfo::placeholder`] for unknown institutions.
    fn contact_info(&self, institution: &str) -> ContactInfo;
}

/// Append-only destination for completed outcomes.
pub trait OutcomeSink: Send + Sync {
    fn append(&self, outcome: &VerificationOutcome) -> Result<()>;
}
