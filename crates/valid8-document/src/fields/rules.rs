// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field extraction rules — ordered pattern tables per claim field, and the
// keyword tables used to classify the certificate type.
//
// Rules are matched against normalized text (single spaces, no punctuation
// beyond `.,()-`). Patterns are case-insensitive and capture a generous run of
// words; the rule's `Span` then cuts that run down to the value at keyword
// boundaries, so upper-case and lower-case OCR output parse like mixed case.

use valid8_core::types::{CertificateType, ClaimField};

/// A word, optionally abbreviated (`Dr.`, `Jr.`).
const WORD: &str = r"[A-Za-z][A-Za-z\-]*\.?";

/// Up to six words; a personal name is cut out of this.
fn person() -> String {
    format!(r"{WORD}(?: {WORD}){{0,5}}")
}

/// Up to twelve words; a course or institution name is cut out of this.
fn phrase() -> String {
    format!(r"{WORD}(?: {WORD}){{0,11}}")
}

/// Up to four words before an institution noun, plus an optional
/// `of ...` tail (`University of Leeds`).
fn institution() -> String {
    format!(
        r"(?:{WORD} ){{0,4}}(?i:university|college|institute|school|academy|polytechnic)\b(?: (?i:of|for) {WORD}(?: {WORD}){{0,4}})?"
    )
}

/// How a rule's capture is cut down to the field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// Taken as captured.
    Exact,
    /// A personal name: ends at the first keyword, connector or (in
    /// mixed-case text) lowercase word.
    Person,
    /// A course or institution name: connectors may join words.
    Phrase,
    /// A phrase built around an institution noun; leading words before the
    /// last keyword are dropped.
    Institution,
}

/// One ordered extraction rule. Every capture group is a candidate value; the
/// first one that is non-blank after cutting wins.
#[derive(Debug, Clone)]
pub struct FieldRule {
    /// Stable identifier recorded as provenance, `<field>/<name>`.
    pub id: &'static str,
    pub field: ClaimField,
    pub span: Span,
    pub pattern: String,
}

impl FieldRule {
    fn new(id: &'static str, field: ClaimField, span: Span, pattern: String) -> Self {
        Self {
            id,
            field,
            span,
            pattern,
        }
    }
}

/// All rules, grouped by field and in priority order within each field.
pub fn default_rules() -> Vec<FieldRule> {
    let person = person();
    let phrase = phrase();
    let institution = institution();

    vec![
        // -- Student name -----------------------------------------------------
        FieldRule::new(
            "student_name/labelled",
            ClaimField::StudentName,
            Span::Person,
            format!(r"\b(?i:student name|full name|name)\s+({person})"),
        ),
        FieldRule::new(
            "student_name/certify-that",
            ClaimField::StudentName,
            Span::Person,
            format!(r"\b(?i:certify that|certifies that|awarded to|presented to|conferred upon)\s+({person})"),
        ),
        FieldRule::new(
            "student_name/honorific",
            ClaimField::StudentName,
            Span::Person,
            format!(r"\b(?i:mrs|mr|ms|dr)\.?\s+({person})"),
        ),
        // -- Institution ------------------------------------------------------
        FieldRule::new(
            "institution/issued-by",
            ClaimField::Institution,
            Span::Phrase,
            format!(r"\b(?i:issued by|awarded by|institution)\s+({phrase})"),
        ),
        FieldRule::new(
            "institution/suffix",
            ClaimField::Institution,
            Span::Institution,
            format!(r"({institution})"),
        ),
        FieldRule::new(
            "institution/from",
            ClaimField::Institution,
            Span::Phrase,
            format!(r"\b(?i:from)\s+({phrase})"),
        ),
        // -- Course -----------------------------------------------------------
        FieldRule::new(
            "course/labelled",
            ClaimField::Course,
            Span::Phrase,
            format!(r"\b(?i:course|program|programme|degree|diploma)\s+(?:(?i:in|of)\s+)?({phrase})"),
        ),
        FieldRule::new(
            "course/degree-name",
            ClaimField::Course,
            Span::Phrase,
            format!(r"\b((?i:bachelor|master|doctor)s? (?i:of) {phrase})"),
        ),
        FieldRule::new(
            "course/completed",
            ClaimField::Course,
            Span::Phrase,
            format!(
                r"\b(?i:successfully completed|completion of|completed)\s+(?:(?i:the)\s+)?(?:(?i:course|program|programme)\s+(?:(?i:in|on)\s+)?)?({phrase})"
            ),
        ),
        // -- Year -------------------------------------------------------------
        FieldRule::new(
            "year/twenty-first-century",
            ClaimField::Year,
            Span::Exact,
            r"\b(20\d{2})\b".to_owned(),
        ),
        FieldRule::new(
            "year/labelled",
            ClaimField::Year,
            Span::Exact,
            r"\b(?i:year)\s+(\d{4})\b".to_owned(),
        ),
        FieldRule::new(
            "year/graduated",
            ClaimField::Year,
            Span::Exact,
            r"\b(?i:graduated in|class of)\s+(\d{4})\b".to_owned(),
        ),
        FieldRule::new(
            "year/twentieth-century",
            ClaimField::Year,
            Span::Exact,
            r"\b(19\d{2})\b".to_owned(),
        ),
        // -- Grade ------------------------------------------------------------
        FieldRule::new(
            "grade/labelled",
            ClaimField::Grade,
            Span::Exact,
            r"\b(?i:grade|cgpa|gpa|percentage|division)\s+([A-Za-z]\b|[A-Z0-9][A-Z0-9.]*)".to_owned(),
        ),
        FieldRule::new(
            "grade/class",
            ClaimField::Grade,
            Span::Exact,
            r"\b(?i:with)\s+((?i:first|second|third|upper second|lower second) (?i:class)(?: (?i:honours|honors))?)"
                .to_owned(),
        ),
        FieldRule::new(
            "grade/secured",
            ClaimField::Grade,
            Span::Exact,
            r"\b(?i:secured|scored)\s+(\d+(?:\.\d+)?)".to_owned(),
        ),
    ]
}

/// Keywords per certificate type, highest priority first. Matching is
/// whole-word and case-insensitive.
pub const TYPE_KEYWORDS: [(CertificateType, &[&str]); 5] = [
    (
        CertificateType::DoctoralDegree,
        &["doctor", "doctoral", "doctorate", "phd", "ph.d"],
    ),
    (
        CertificateType::MasterDegree,
        &["master", "masters", "m.sc", "m.tech", "m.a", "m.com", "mba"],
    ),
    (
        CertificateType::BachelorDegree,
        &["bachelor", "bachelors", "b.sc", "b.tech", "b.a", "b.com"],
    ),
    (CertificateType::Diploma, &["diploma"]),
    (
        CertificateType::Certificate,
        &["certificate", "certification", "completion", "participation"],
    ),
];

/// Honorific prefix removed from extracted names.
pub const HONORIFIC_PATTERN: &str = r"^(?i:mrs|mr|ms|dr)\b\.?\s*";

/// Words that join the parts of course and institution names.
pub const CONNECTORS: [&str; 6] = ["of", "in", "and", "for", "the", "on"];

/// Institution nouns; the `Institution` span is anchored on the first one.
pub const INSTITUTION_NOUNS: [&str; 6] =
    ["university", "college", "institute", "school", "academy", "polytechnic"];

/// Words that end a captured name or phrase: labels of other fields and the
/// verbs and prepositions that surround a value in certificate prose.
/// Compared case-insensitively.
pub const BOUNDARY_WORDS: [&str; 31] = [
    "course", "program", "programme", "institution", "year", "grade", "issued", "awarded",
    "date", "dated", "name", "student", "from", "has", "have", "had", "is", "was", "who",
    "completed", "successfully", "at", "by", "with", "to", "that", "this", "graduated",
    "secured", "scored", "certify",
];

/// Further words that can never be part of a personal name.
pub const NAME_STOP_WORDS: [&str; 8] = [
    "degree", "diploma", "certificate", "university", "college", "bachelor", "master", "doctor",
];

/// All-caps words up to this length are kept as written in mixed-case
/// values (`MBA`, `IIT`).
pub const ACRONYM_MAX_LEN: usize = 4;

/// Accepted range for a graduation year.
pub const YEAR_RANGE: std::ops::RangeInclusive<u32> = 1950..=2030;
