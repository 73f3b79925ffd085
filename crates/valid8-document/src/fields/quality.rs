// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extraction quality scoring.

use serde::{Deserialize, Serialize};
use valid8_core::types::{ClaimField, ClaimsRecord};

/// Score at or above which extracted claims are considered reliable.
pub const RELIABLE_SCORE: u32 = 60;

/// How much the extracted claims can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionQuality {
    /// 0..=100.
    pub score: u32,
    pub issues: Vec<String>,
    pub reliable: bool,
}

/// Score claims by OCR confidence and by which essential fields are present.
pub fn assess_quality(claims: &ClaimsRecord) -> ExtractionQuality {
    let mut score = 0;
    let mut issues = Vec::new();

    match claims.confidence {
        c if c > 80.0 => score += 30,
        c if c > 60.0 => score += 20,
        c if c > 40.0 => score += 10,
        _ => issues.push("Low OCR confidence".to_owned()),
    }

    for field in [ClaimField::StudentName, ClaimField::Institution, ClaimField::Course] {
        if claims.has(field) {
            score += 20;
        } else {
            issues.push(format!("Missing {}", field.as_str()));
        }
    }

    if claims.year.len() == 4 && claims.year.bytes().all(|b| b.is_ascii_digit()) {
        score += 10;
    }

    let score = score.min(100);
    ExtractionQuality {
        score,
        issues,
        reliable: score >= RELIABLE_SCORE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(confidence: f32) -> ClaimsRecord {
        ClaimsRecord {
            student_name: "Jane Doe".into(),
            institution: "Tech University".into(),
            course: "Computer Science".into(),
            year: "2021".into(),
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn complete_confident_claims_score_full() {
        let quality = assess_quality(&claims(92.0));
        assert_eq!(quality.score, 100);
        assert!(quality.issues.is_empty());
        assert!(quality.reliable);
    }

    #[test]
    fn missing_fields_are_listed() {
        let mut partial = claims(65.0);
        partial.course.clear();
        partial.year = "20".into();
        let quality = assess_quality(&partial);
        assert_eq!(quality.score, 60);
        assert_eq!(quality.issues, vec!["Missing course".to_owned()]);
        assert!(quality.reliable);
    }

    #[test]
    fn low_confidence_is_an_issue() {
        let quality = assess_quality(&ClaimsRecord::default());
        assert_eq!(quality.score, 0);
        assert_eq!(quality.issues.len(), 4);
        assert_eq!(quality.issues[0], "Low OCR confidence");
        assert!(!quality.reliable);
    }
}
