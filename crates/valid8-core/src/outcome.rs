// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification outcome — the only value that crosses the pipeline/caller
// boundary. Built once per run and never modified after the run completes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flags::FlagCode;
use crate::types::{
    AuthenticityVerdict, CertificateRecord, ClaimsRecord, ContactInfo, VerificationId,
};

/// Final verdict of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Flag,
    ManualVerification,
    Error,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Flag => "flag",
            Self::ManualVerification => "manual_verification",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Authenticity,
    DirectLink,
    Extraction,
    TemplateConformance,
    Signature,
    RecordLookup,
    InstitutionApi,
    ManualFallback,
}

impl Step {
    pub const ORDER: [Step; 8] = [
        Self::Authenticity,
        Self::DirectLink,
        Self::Extraction,
        Self::TemplateConformance,
        Self::Signature,
        Self::RecordLookup,
        Self::InstitutionApi,
        Self::ManualFallback,
    ];

    /// 1-based position in [`Step::ORDER`].
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Authenticity => "Authenticity Check",
            Self::DirectLink => "Direct Link Verification",
            Self::Extraction => "OCR Extraction",
            Self::TemplateConformance => "Template Matching",
            Self::Signature => "Digital Signature",
            Self::RecordLookup => "Database Verification",
            Self::InstitutionApi => "Institution API",
            Self::ManualFallback => "Manual Verification",
        }
    }
}

/// Result class of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Warning,
    Failed,
    Skipped,
    Error,
}

impl StepStatus {
    fn marker(&self) -> &'static str {
        match self {
            Self::Passed => "✓",
            Self::Failed | Self::Error => "❌",
            Self::Warning => "⚠️",
            Self::Skipped => "–",
        }
    }
}

/// One entry of the outcome's step list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: Step,
    pub status: StepStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StepReport {
    pub fn new(step: Step, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            step,
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn passed(step: Step, message: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Passed, message)
    }

    pub fn warning(step: Step, message: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Warning, message)
    }

    pub fn failed(step: Step, message: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Failed, message)
    }

    pub fn skipped(step: Step, message: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Skipped, message)
    }

    pub fn error(step: Step, message: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Error, message)
    }

    /// Attach structured details for auditing.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {}: {} {}",
            self.step.number(),
            self.step.title(),
            self.status.marker(),
            self.message
        )
    }
}

/// Everything a caller learns from one verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub id: VerificationId,
    pub status: VerificationStatus,
    pub document_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    pub steps: Vec<StepReport>,
    /// Distinct flags, in the order they were raised.
    pub flags: Vec<FlagCode>,
    /// Claims after any merge with a confirmed record.
    pub certificate_data: ClaimsRecord,
    pub matched_record: Option<CertificateRecord>,
    pub authenticity: Option<AuthenticityVerdict>,
    pub contact_info: Option<ContactInfo>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl VerificationOutcome {
    pub fn has_flag(&self, flag: FlagCode) -> bool {
        self.flags.contains(&flag)
    }

    /// Step reports rendered one per line, as shown to reviewers.
    pub fn summary(&self) -> String {
        self.steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
