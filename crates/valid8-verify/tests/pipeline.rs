// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end runs of the verifier with a scripted text recognizer.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use valid8_core::error::{Result, Valid8Error};
use valid8_core::flags::FlagCode;
use valid8_core::oracle::{EvidenceQuery, Oracle};
use valid8_core::outcome::{Step, StepStatus, VerificationStatus};
use valid8_core::types::{
    Document, EvidenceResult, EvidenceSource, MediaType, SignatureEnvelope,
};
use valid8_document::{RecognizedLine, RecognizedWord, TextRecognizer};
use valid8_security::{AuditLog, IssuerKeyPair, SignatureOracle};
use valid8_verify::{Seed, VerificationRequest, Verifier};

const MBA_TEXT: &str = "Student Name: Jane Smith\n\
    Course: Master of Business Administration\n\
    Issued by: Business College\n\
    Year: 2024\n\
    Grade: A";

const SEED: &str = r#"{
  "institutions": [
    { "name": "Business College", "code": "BIZ_COLLEGE_002",
      "contact": { "phone": "+91-8765432109", "email": "registrar@bizcollege.edu",
                   "hours": "10 AM - 4 PM, Monday to Saturday" },
      "required_fields": ["student_name", "course_name", "issue_date"],
      "issued": [ { "student_name": "Jane Smith", "course": "Master of Business Administration",
                    "issue_date": "2024-06-10" } ] }
  ],
  "certificates": [
    { "student_name": "Jane Smith", "course": "Master of Business Administration",
      "institution": "Business College", "issue_date": "2024-06-10", "grade": "A",
      "certificate_hash": "a1b2c3d4e5f6" }
  ]
}"#;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Returns fixed text, one line per input line, every word at `confidence`.
struct ScriptedRecognizer {
    text: &'static str,
    confidence: f32,
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<Vec<RecognizedLine>> {
        Ok(self
            .text
            .lines()
            .map(|line| {
                RecognizedLine::new(
                    line.split_whitespace()
                        .map(|word| RecognizedWord::new(word, self.confidence))
                        .collect(),
                )
            })
            .collect())
    }
}

struct OfflineRecognizer;

impl TextRecognizer for OfflineRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<Vec<RecognizedLine>> {
        Err(Valid8Error::ExtractionFailed("engine offline".into()))
    }
}

struct PanickingRecognizer;

impl TextRecognizer for PanickingRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<Vec<RecognizedLine>> {
        panic!("model tensor shape mismatch")
    }
}

/// A record store that never answers in time.
struct StalledRegistry;

impl Oracle for StalledRegistry {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::RecordLookup
    }

    fn check(&self, _query: &EvidenceQuery) -> Result<EvidenceResult> {
        std::thread::sleep(Duration::from_millis(1000));
        Ok(EvidenceResult::not_verified(EvidenceSource::RecordLookup))
    }
}

fn mba_recognizer() -> Arc<dyn TextRecognizer> {
    Arc::new(ScriptedRecognizer {
        text: MBA_TEXT,
        confidence: 91.0,
    })
}

fn seed() -> Seed {
    Seed::from_json(SEED).unwrap()
}

/// Seed in which only the manual fallback can answer.
fn seed_without_evidence() -> Seed {
    let mut seed = seed();
    seed.certificates.clear();
    seed.institutions[0].issued.clear();
    seed
}

fn png_bytes() -> Vec<u8> {
    let page = RgbImage::from_pixel(240, 160, Rgb([250, 250, 250]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(page)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn certificate() -> Document {
    Document::new(png_bytes(), MediaType::Png).with_name("jane-smith-mba.png")
}

fn verifier(recognizer: Arc<dyn TextRecognizer>, seed: &Seed) -> Verifier {
    Verifier::builder(recognizer).seed(seed).build().unwrap()
}

fn statuses(outcome: &valid8_core::outcome::VerificationOutcome) -> Vec<(Step, StepStatus)> {
    outcome.steps.iter().map(|s| (s.step, s.status)).collect()
}

// ---------------------------------------------------------------------------
// Terminal paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registry_link_settles_at_step_two() {
    let outcome = verifier(mba_recognizer(), &seed())
        .verify(
            VerificationRequest::new(certificate())
                .with_reference("https://registry.valid8.example/verify/A1B2C3D4E5F6"),
        )
        .await;

    assert_eq!(outcome.status, VerificationStatus::Verified);
    assert_eq!(outcome.steps.len(), 2);
    assert_eq!(outcome.steps[1].status, StepStatus::Passed);
    assert_eq!(outcome.certificate_data.student_name, "Jane Smith");
    assert_eq!(
        outcome.matched_record.as_ref().map(|r| r.certificate_hash.as_str()),
        Some("a1b2c3d4e5f6")
    );
    assert!(outcome.flags.is_empty());
}

#[tokio::test]
async fn unknown_link_falls_through_to_record_lookup() {
    let outcome = verifier(mba_recognizer(), &seed())
        .verify(
            VerificationRequest::new(certificate())
                .with_reference("https://registry.valid8.example/verify/ffff0000"),
        )
        .await;

    assert_eq!(outcome.steps[1].status, StepStatus::Warning);
    assert_eq!(
        outcome.steps[1].message,
        "Invalid verification link or certificate not found"
    );
    assert_eq!(outcome.status, VerificationStatus::Verified);
    assert_eq!(outcome.steps.last().unwrap().step, Step::RecordLookup);
}

#[tokio::test]
async fn record_lookup_settles_at_step_six() {
    let outcome = verifier(mba_recognizer(), &seed())
        .verify(VerificationRequest::new(certificate()))
        .await;

    assert_eq!(
        statuses(&outcome),
        vec![
            (Step::Authenticity, StepStatus::Warning),
            (Step::DirectLink, StepStatus::Skipped),
            (Step::Extraction, StepStatus::Passed),
            (Step::TemplateConformance, StepStatus::Passed),
            (Step::Signature, StepStatus::Skipped),
            (Step::RecordLookup, StepStatus::Passed),
        ]
    );
    assert_eq!(outcome.status, VerificationStatus::Verified);
    assert_eq!(outcome.certificate_data.institution, "Business College");
    assert_eq!(outcome.certificate_data.course, "Master of Business Administration");
    assert!((outcome.certificate_data.confidence - 91.0).abs() < 0.01);
    let authenticity = outcome.authenticity.as_ref().unwrap();
    assert!(!authenticity.has_watermark);
}

#[tokio::test]
async fn institution_api_settles_at_step_seven() {
    let mut seed = seed();
    seed.certificates.clear();

    let outcome = verifier(mba_recognizer(), &seed)
        .verify(VerificationRequest::new(certificate()))
        .await;

    assert_eq!(outcome.status, VerificationStatus::Verified);
    assert_eq!(outcome.steps.len(), 7);
    assert_eq!(outcome.steps[5].status, StepStatus::Warning);
    assert_eq!(outcome.steps[6].status, StepStatus::Passed);
    assert_eq!(
        outcome.matched_record.as_ref().map(|r| r.student_name.as_str()),
        Some("Jane Smith")
    );
}

#[tokio::test]
async fn clean_document_without_evidence_needs_manual_verification() {
    let outcome = verifier(mba_recognizer(), &seed_without_evidence())
        .verify(VerificationRequest::new(certificate()))
        .await;

    assert_eq!(outcome.status, VerificationStatus::ManualVerification);
    assert_eq!(outcome.steps.len(), 8);
    assert!(outcome.flags.is_empty());
    assert_eq!(
        outcome.steps[6].message,
        "Business College does not offer a verification API"
    );
    let contact = outcome.contact_info.as_ref().unwrap();
    assert_eq!(contact.phone, "+91-8765432109");
    assert_eq!(contact.email, "registrar@bizcollege.edu");
}

#[tokio::test]
async fn unknown_institution_is_flagged_as_template_mismatch() {
    let recognizer = Arc::new(ScriptedRecognizer {
        text: "Student Name: Jane Smith\nCourse: Master of Business Administration\n\
               Issued by: Harbour College\nYear: 2024",
        confidence: 88.0,
    });
    let outcome = verifier(recognizer, &seed())
        .verify(VerificationRequest::new(certificate()))
        .await;

    assert_eq!(outcome.status, VerificationStatus::Flag);
    assert_eq!(outcome.steps.len(), 8);
    assert_eq!(outcome.flags, vec![FlagCode::TemplateMismatch]);
    assert_eq!(outcome.steps[3].message, "No template found for Harbour College");
    assert_eq!(
        outcome.contact_info,
        Some(valid8_core::types::ContactInfo::placeholder())
    );
}

#[tokio::test]
async fn missing_template_fields_are_listed() {
    let recognizer = Arc::new(ScriptedRecognizer {
        text: "Student Name: Jane Smith\nCourse: Master of Business Administration\n\
               Issued by: Business College",
        confidence: 88.0,
    });
    let outcome = verifier(recognizer, &seed_without_evidence())
        .verify(VerificationRequest::new(certificate()))
        .await;

    assert_eq!(outcome.status, VerificationStatus::Flag);
    assert_eq!(outcome.steps[3].status, StepStatus::Warning);
    assert_eq!(outcome.steps[3].message, "Missing required fields: issue_date");
    assert!(outcome.has_flag(FlagCode::TemplateMismatch));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recognizer_failure_flags_and_stops_at_extraction() {
    let outcome = verifier(Arc::new(OfflineRecognizer), &seed())
        .verify(VerificationRequest::new(certificate()))
        .await;

    assert_eq!(outcome.status, VerificationStatus::Flag);
    assert_eq!(outcome.steps.len(), 3);
    assert_eq!(outcome.steps[2].status, StepStatus::Failed);
    assert!(outcome.steps[2].message.contains("engine offline"));
    assert_eq!(outcome.flags, vec![FlagCode::OcrExtractionFailed]);
}

#[tokio::test]
async fn corrupt_upload_is_reported_twice_then_flagged() {
    let document = Document::new(b"definitely not a png".to_vec(), MediaType::Png);
    let outcome = verifier(mba_recognizer(), &seed())
        .verify(VerificationRequest::new(document))
        .await;

    assert_eq!(
        statuses(&outcome),
        vec![
            (Step::Authenticity, StepStatus::Error),
            (Step::DirectLink, StepStatus::Skipped),
            (Step::Extraction, StepStatus::Failed),
        ]
    );
    assert_eq!(outcome.status, VerificationStatus::Flag);
    assert_eq!(outcome.flags, vec![FlagCode::OcrExtractionFailed]);
    assert!(outcome.authenticity.is_none());
}

#[tokio::test]
async fn recognizer_panic_becomes_processing_error() {
    let outcome = verifier(Arc::new(PanickingRecognizer), &seed())
        .verify(VerificationRequest::new(certificate()))
        .await;

    assert_eq!(outcome.status, VerificationStatus::Error);
    assert_eq!(outcome.flags, vec![FlagCode::ProcessingError]);
    assert_eq!(outcome.steps.len(), 3);
    assert_eq!(outcome.steps[2].status, StepStatus::Error);
    assert!(outcome.error.as_deref().unwrap().contains("model tensor shape mismatch"));
}

#[tokio::test]
async fn stalled_oracle_times_out_and_the_run_continues() {
    let outcome = Verifier::builder(mba_recognizer())
        .seed(&seed())
        .record_oracle(StalledRegistry)
        .oracle_timeout(Duration::from_millis(100))
        .build()
        .unwrap()
        .verify(VerificationRequest::new(certificate()))
        .await;

    assert_eq!(outcome.steps[5].status, StepStatus::Error);
    assert!(outcome.steps[5].message.contains("timed out"));
    assert_eq!(outcome.status, VerificationStatus::Verified);
    assert_eq!(outcome.steps.last().unwrap().step, Step::InstitutionApi);
    assert!(outcome.flags.is_empty());
}

// ---------------------------------------------------------------------------
// Signatures and auditing
// ---------------------------------------------------------------------------

fn signed_verifier(key: &IssuerKeyPair, seed: &Seed) -> Verifier {
    let oracle = SignatureOracle::new()
        .trust("Business College", &key.public_key_hex())
        .unwrap();
    Verifier::builder(mba_recognizer())
        .seed(seed)
        .signature_oracle(oracle)
        .build()
        .unwrap()
}

#[tokio::test]
async fn valid_signature_passes_step_five() {
    let key = IssuerKeyPair::generate().unwrap();
    let document = certificate();
    let envelope = SignatureEnvelope {
        signer: "Business College".into(),
        signature_hex: key.sign_hex(document.bytes()).unwrap(),
    };

    let outcome = signed_verifier(&key, &seed_without_evidence())
        .verify(VerificationRequest::new(document).with_signature(envelope))
        .await;

    assert_eq!(outcome.steps[4].status, StepStatus::Passed);
    assert_eq!(outcome.status, VerificationStatus::ManualVerification);
}

#[tokio::test]
async fn invalid_signature_is_flagged() {
    let key = IssuerKeyPair::generate().unwrap();
    let envelope = SignatureEnvelope {
        signer: "Business College".into(),
        signature_hex: key.sign_hex(b"a different document").unwrap(),
    };

    let outcome = signed_verifier(&key, &seed_without_evidence())
        .verify(VerificationRequest::new(certificate()).with_signature(envelope))
        .await;

    assert_eq!(outcome.steps[4].status, StepStatus::Failed);
    assert_eq!(outcome.flags, vec![FlagCode::SignatureInvalid]);
    assert_eq!(outcome.status, VerificationStatus::Flag);
}

#[tokio::test]
async fn outcomes_are_written_to_the_audit_log() {
    let log = Arc::new(AuditLog::open_in_memory().unwrap());
    let verifier = Verifier::builder(mba_recognizer())
        .seed(&seed())
        .sink(log.clone())
        .build()
        .unwrap();

    let outcome = verifier.verify(VerificationRequest::new(certificate())).await;

    let entries = log.entries_for_hash(&outcome.document_hash).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, VerificationStatus::Verified);
    let stored = log.outcome(&outcome.id.to_string()).unwrap().unwrap();
    assert_eq!(stored.steps.len(), outcome.steps.len());
}

#[tokio::test]
async fn identical_uploads_share_a_hash_but_not_an_id() {
    let verifier = verifier(mba_recognizer(), &seed());
    let first = verifier.verify(VerificationRequest::new(certificate())).await;
    let second = verifier.verify(VerificationRequest::new(certificate())).await;

    assert_eq!(first.document_hash, second.document_hash);
    assert_ne!(first.id, second.id);
    assert_eq!(first.status, second.status);
}
