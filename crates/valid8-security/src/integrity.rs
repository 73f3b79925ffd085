// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fingerprints — SHA-256 digests of uploaded documents and certificate records.

use sha2::{Digest, Sha256};
use valid8_core::error::{Result, Valid8Error};
use valid8_core::types::CertificateRecord;

/// Lowercase hex SHA-256 of `data`.
///
/// Every verification outcome carries the digest of the uploaded bytes so
/// audit entries for the same file can be grouped.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check `data` against a hex digest. Hex case is ignored.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hash_bytes(data);
    if actual.eq_ignore_ascii_case(expected_hex.trim()) {
        Ok(())
    } else {
        Err(Valid8Error::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

/// Registry fingerprint of a certificate: SHA-256 over the holder name,
/// course, institution and issue date, concatenated with no separator.
pub fn certificate_hash(
    student_name: &str,
    course: &str,
    institution: &str,
    issue_date: &str,
) -> String {
    let mut hasher = Sha256::new();
    for part in [student_name, course, institution, issue_date] {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// [`certificate_hash`] of a stored record.
pub fn record_hash(record: &CertificateRecord) -> String {
    certificate_hash(
        &record.student_name,
        &record.course,
        &record.institution,
        &record.issue_date,
    )
}
