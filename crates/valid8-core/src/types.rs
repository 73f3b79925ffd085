// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the valid8 verification pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationId(pub Uuid);

impl VerificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VerificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VerificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Declared media type of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    Png,
    Jpeg,
    Tiff,
    Bmp,
    Gif,
    Webp,
    /// Anything else; carried so the loader can reject it by name.
    Other(String),
}

impl MediaType {
    /// MIME type string.
    pub fn mime_type(&self) -> &str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Other(mime) => mime,
        }
    }

    /// Infer the media type from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "tif" | "tiff" => Self::Tiff,
            "bmp" => Self::Bmp,
            "gif" => Self::Gif,
            "webp" => Self::Webp,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Parse a MIME string such as `image/png`.
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "application/pdf" => Self::Pdf,
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/tiff" => Self::Tiff,
            "image/bmp" => Self::Bmp,
            "image/gif" => Self::Gif,
            "image/webp" => Self::Webp,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Guess the media type from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let kind = match bytes {
            [b'%', b'P', b'D', b'F', ..] => Self::Pdf,
            [0x89, b'P', b'N', b'G', ..] => Self::Png,
            [0xFF, 0xD8, 0xFF, ..] => Self::Jpeg,
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Self::Tiff,
            [b'G', b'I', b'F', b'8', ..] => Self::Gif,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Self::Webp,
            [b'B', b'M', ..] => Self::Bmp,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// An uploaded certificate. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Document {
    bytes: Vec<u8>,
    media_type: MediaType,
    name: Option<String>,
}

impl Document {
    pub fn new(bytes: Vec<u8>, media_type: MediaType) -> Self {
        Self {
            bytes,
            media_type,
            name: None,
        }
    }

    /// Attach a display name (usually the uploaded file name).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Detached signature supplied alongside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    /// Name of the signing authority, used to pick the trusted key.
    pub signer: String,
    /// Hex-encoded ASN.1 DER ECDSA signature over the document bytes.
    pub signature_hex: String,
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Degree category inferred from the certificate text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    DoctoralDegree,
    MasterDegree,
    BachelorDegree,
    Diploma,
    Certificate,
    #[default]
    Unknown,
}

impl CertificateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoctoralDegree => "doctoral_degree",
            Self::MasterDegree => "master_degree",
            Self::BachelorDegree => "bachelor_degree",
            Self::Diploma => "diploma",
            Self::Certificate => "certificate",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The extractable text fields of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimField {
    StudentName,
    Institution,
    Course,
    Year,
    Grade,
}

impl ClaimField {
    pub const ALL: [ClaimField; 5] = [
        Self::StudentName,
        Self::Institution,
        Self::Course,
        Self::Year,
        Self::Grade,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StudentName => "student_name",
            Self::Institution => "institution",
            Self::Course => "course",
            Self::Year => "year",
            Self::Grade => "grade",
        }
    }

    /// Resolve a field name as used by institution templates. Accepts the
    /// record-style aliases (`course_name`, `institution_name`, `issue_date`).
    pub fn from_template_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "student_name" | "name" => Some(Self::StudentName),
            "institution" | "institution_name" => Some(Self::Institution),
            "course" | "course_name" => Some(Self::Course),
            "year" | "issue_date" | "graduation_year" => Some(Self::Year),
            "grade" => Some(Self::Grade),
            _ => None,
        }
    }
}

/// Which extraction rule produced a field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub field: ClaimField,
    /// Stable identifier of the matching rule, e.g. `course/degree-name`.
    pub rule: String,
}

/// Structured claims extracted from a certificate. Empty strings mean the
/// field is unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimsRecord {
    pub student_name: String,
    pub institution: String,
    pub course: String,
    pub year: String,
    pub grade: String,
    pub certificate_type: CertificateType,
    /// OCR confidence of the text the claims were parsed from (0..=100).
    pub confidence: f32,
    pub provenance: Vec<FieldProvenance>,
}

impl ClaimsRecord {
    pub fn field(&self, field: ClaimField) -> &str {
        match field {
            ClaimField::StudentName => &self.student_name,
            ClaimField::Institution => &self.institution,
            ClaimField::Course => &self.course,
            ClaimField::Year => &self.year,
            ClaimField::Grade => &self.grade,
        }
    }

    pub fn field_mut(&mut self, field: ClaimField) -> &mut String {
        match field {
            ClaimField::StudentName => &mut self.student_name,
            ClaimField::Institution => &mut self.institution,
            ClaimField::Course => &mut self.course,
            ClaimField::Year => &mut self.year,
            ClaimField::Grade => &mut self.grade,
        }
    }

    pub fn has(&self, field: ClaimField) -> bool {
        !self.field(field).trim().is_empty()
    }

    /// Provenance entry for `field`, if it was extracted.
    pub fn provenance_of(&self, field: ClaimField) -> Option<&FieldProvenance> {
        self.provenance.iter().find(|p| p.field == field)
    }

    /// Overwrite the claims with the values of a confirmed record. Fields the
    /// record leaves empty keep their extracted value.
    pub fn merge_record(&mut self, record: &CertificateRecord) {
        let year = record_year(&record.issue_date);
        let updates = [
            (ClaimField::StudentName, record.student_name.as_str()),
            (ClaimField::Institution, record.institution.as_str()),
            (ClaimField::Course, record.course.as_str()),
            (ClaimField::Year, year),
            (ClaimField::Grade, record.grade.as_str()),
        ];
        for (field, value) in updates {
            if !value.trim().is_empty() {
                *self.field_mut(field) = value.to_owned();
            }
        }
    }

    /// Claims built entirely from a confirmed record.
    pub fn from_record(record: &CertificateRecord) -> Self {
        let mut claims = Self::default();
        claims.merge_record(record);
        claims
    }
}

fn record_year(issue_date: &str) -> &str {
    let candidate = issue_date.get(..4).unwrap_or("");
    if candidate.len() == 4 && candidate.bytes().all(|b| b.is_ascii_digit()) {
        candidate
    } else {
        ""
    }
}

// ---------------------------------------------------------------------------
// Authenticity
// ---------------------------------------------------------------------------

/// Category of watermark evidence that drove the authenticity verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkType {
    #[default]
    None,
    Template,
    Digital,
    Text,
    Pattern,
    Alpha,
}

impl WatermarkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Template => "template",
            Self::Digital => "digital",
            Self::Text => "text",
            Self::Pattern => "pattern",
            Self::Alpha => "alpha",
        }
    }
}

impl fmt::Display for WatermarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detector's contribution to the verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Method-specific measurements: matched template, contour or blob
    /// counts and the like.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Fused result of all watermark detectors for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityVerdict {
    pub has_watermark: bool,
    pub watermark_type: WatermarkType,
    pub confidence: f32,
    /// Per-method confidences, keyed by method name.
    pub methods: BTreeMap<String, MethodResult>,
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// A certificate known to an evidence source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub student_name: String,
    pub course: String,
    pub institution: String,
    /// ISO date (`YYYY-MM-DD`) or bare year.
    #[serde(default)]
    pub issue_date: String,
    #[serde(default)]
    pub grade: String,
    /// SHA-256 fingerprint; filled in by the registry when left empty.
    #[serde(default)]
    pub certificate_hash: String,
}

/// Which oracle produced an [`EvidenceResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    LinkRegistry,
    Signature,
    RecordLookup,
    InstitutionApi,
}

impl EvidenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkRegistry => "link_registry",
            Self::Signature => "signature",
            Self::RecordLookup => "record_lookup",
            Self::InstitutionApi => "institution_api",
        }
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one oracle invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceResult {
    pub verified: bool,
    pub source: EvidenceSource,
    pub matched_record: Option<CertificateRecord>,
    pub error: Option<String>,
    /// False when the oracle had nothing to examine (e.g. no signature).
    pub applicable: bool,
}

impl EvidenceResult {
    pub fn verified(source: EvidenceSource, record: Option<CertificateRecord>) -> Self {
        Self {
            verified: true,
            source,
            matched_record: record,
            error: None,
            applicable: true,
        }
    }

    pub fn not_verified(source: EvidenceSource) -> Self {
        Self {
            verified: false,
            source,
            matched_record: None,
            error: None,
            applicable: true,
        }
    }

    pub fn failed(source: EvidenceSource, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::not_verified(source)
        }
    }

    pub fn not_applicable(source: EvidenceSource) -> Self {
        Self {
            applicable: false,
            ..Self::not_verified(source)
        }
    }
}

/// How to reach an institution for manual verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: String,
    pub email: String,
    pub hours: String,
}

impl ContactInfo {
    /// Returned for institutions the contact registry does not know.
    pub fn placeholder() -> Self {
        Self {
            phone: "Contact information not available".into(),
            email: "Contact information not available".into(),
            hours: "Please contact institution directly".into(),
        }
    }
}
