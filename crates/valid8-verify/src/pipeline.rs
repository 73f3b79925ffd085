// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-run pipeline state and the step result type.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use valid8_core::error::Valid8Error;
use valid8_core::flags::FlagCode;
use valid8_core::oracle::EvidenceQuery;
use valid8_core::outcome::{StepReport, VerificationOutcome, VerificationStatus};
use valid8_core::types::{
    AuthenticityVerdict, CertificateRecord, ClaimsRecord, ContactInfo, Document,
    SignatureEnvelope, VerificationId,
};
use valid8_document::Frame;

/// What the orchestrator does after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Stop here with this status.
    Terminate(VerificationStatus),
}

/// Mutable state of one run. Dropped, frames included, when the run ends.
pub(crate) struct RunState {
    pub id: VerificationId,
    pub started_at: DateTime<Utc>,
    pub document: Arc<Document>,
    pub document_hash: String,
    pub reference: Option<String>,
    pub signature: Option<SignatureEnvelope>,

    pub steps: Vec<StepReport>,
    pub flags: Vec<FlagCode>,
    pub claims: ClaimsRecord,
    pub frames: Option<Vec<Frame>>,
    /// Loader failure from the authenticity step, reported again by extraction.
    pub load_error: Option<Valid8Error>,
    pub authenticity: Option<AuthenticityVerdict>,
    pub matched_record: Option<CertificateRecord>,
    pub contact_info: Option<ContactInfo>,
    pub error: Option<String>,
}

impl RunState {
    pub fn new(
        document: Arc<Document>,
        document_hash: String,
        reference: Option<String>,
        signature: Option<SignatureEnvelope>,
    ) -> Self {
        Self {
            id: VerificationId::new(),
            started_at: Utc::now(),
            document,
            document_hash,
            reference,
            signature,
            steps: Vec::with_capacity(8),
            flags: Vec::new(),
            claims: ClaimsRecord::default(),
            frames: None,
            load_error: None,
            authenticity: None,
            matched_record: None,
            contact_info: None,
            error: None,
        }
    }

    pub fn report(&mut self, report: StepReport) {
        self.steps.push(report);
    }

    /// Raise a flag once; later raises of the same code are ignored.
    pub fn raise(&mut self, flag: FlagCode) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    /// Snapshot of the current claims for an oracle.
    pub fn query(&self) -> Arc<EvidenceQuery> {
        Arc::new(
            EvidenceQuery::new(Arc::clone(&self.document), self.claims.clone())
                .with_reference(self.reference.clone())
                .with_signature(self.signature.clone()),
        )
    }

    /// Close the run. Reaching the manual fallback with flags raised
    /// downgrades the verdict to `flag`.
    pub fn finish(self, status: VerificationStatus, elapsed_ms: u64) -> VerificationOutcome {
        let status = match status {
            VerificationStatus::ManualVerification if !self.flags.is_empty() => {
                VerificationStatus::Flag
            }
            other => other,
        };

        VerificationOutcome {
            id: self.id,
            status,
            document_hash: self.document_hash,
            document_name: self.document.name().map(str::to_owned),
            steps: self.steps,
            flags: self.flags,
            certificate_data: self.claims,
            matched_record: self.matched_record,
            authenticity: self.authenticity,
            contact_info: self.contact_info,
            error: self.error,
            started_at: self.started_at,
            elapsed_ms,
        }
    }
}
