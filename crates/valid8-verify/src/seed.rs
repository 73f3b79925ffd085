// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Seed data — the institutions and known certificates a verifier starts with.
//
// Format (JSON):
//   {
//     "institutions": [
//       { "name": "Tech University", "code": "TECH_UNIV_001",
//         "contact": { "phone": "...", "email": "...", "hours": "..." },
//         "required_fields": ["student_name", "course_name", "issue_date", "grade"],
//         "public_key": "04...",
//         "issued": [ { "student_name": "...", "course": "...", "issue_date": "..." } ] }
//     ],
//     "certificates": [ { "student_name": "...", "course": "...", "institution": "...",
//                         "issue_date": "...", "grade": "..." } ]
//   }

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use valid8_core::error::Result;
use valid8_core::types::{CertificateRecord, ContactInfo};
use valid8_security::SignatureOracle;

/// A certificate an institution's own API will confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCertificate {
    pub student_name: String,
    pub course: String,
    #[serde(default)]
    pub issue_date: String,
}

/// One verified institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionEntry {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
    /// Fields printed on every certificate; `None` when no template is on file.
    #[serde(default)]
    pub required_fields: Option<BTreeSet<String>>,
    /// Certificates answerable through the institution API. Empty means the
    /// institution exposes no API.
    #[serde(default)]
    pub issued: Vec<IssuedCertificate>,
    /// Uncompressed P-256 public key (hex) the institution signs with.
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub institutions: Vec<InstitutionEntry>,
    /// Records held in the internal registry.
    #[serde(default)]
    pub certificates: Vec<CertificateRecord>,
}

impl Seed {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let seed = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(
            institutions = seed.institutions.len(),
            certificates = seed.certificates.len(),
            "seed loaded"
        );
        Ok(seed)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Signature oracle trusting every institution that publishes a key,
    /// under both its name and its code.
    pub fn signature_oracle(&self) -> Result<SignatureOracle> {
        self.institutions
            .iter()
            .filter_map(|entry| entry.public_key.as_deref().map(|key| (entry, key)))
            .try_fold(SignatureOracle::new(), |oracle, (entry, key)| {
                oracle.trust(&entry.name, key)?.trust(&entry.code, key)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_seed_uses_defaults() {
        let seed = Seed::from_json(
            r#"{ "institutions": [ { "name": "Medical School", "code": "MED_SCHOOL_003" } ] }"#,
        )
        .unwrap();
        let entry = &seed.institutions[0];
        assert!(entry.contact.is_none());
        assert!(entry.required_fields.is_none());
        assert!(entry.issued.is_empty());
        assert!(seed.certificates.is_empty());
    }

    #[test]
    fn published_keys_become_trusted_signers() {
        let key = valid8_security::IssuerKeyPair::generate().unwrap();
        let json = format!(
            r#"{{ "institutions": [
                {{ "name": "Tech University", "code": "TECH_UNIV_001", "public_key": "{}" }},
                {{ "name": "Medical School", "code": "MED_SCHOOL_003" }} ] }}"#,
            key.public_key_hex()
        );
        let oracle = Seed::from_json(&json).unwrap().signature_oracle().unwrap();
        assert_eq!(oracle.trusted_signers(), 2);

        let signature = key.sign_hex(b"transcript").unwrap();
        oracle.verify("TECH_UNIV_001", &signature, b"transcript").unwrap();
        assert!(oracle.verify("Medical School", &signature, b"transcript").is_err());
    }

    #[test]
    fn bad_published_key_is_rejected() {
        let seed = Seed::from_json(
            r#"{ "institutions": [ { "name": "Tech University", "code": "T1", "public_key": "04ab" } ] }"#,
        )
        .unwrap();
        assert!(seed.signature_oracle().is_err());
    }

    #[test]
    fn malformed_seed_is_a_serialization_error() {
        let err = Seed::from_json("{ \"institutions\": 3 }").unwrap_err();
        assert!(matches!(err, valid8_core::error::Valid8Error::Serialization(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"{ "certificates": [ { "student_name": "Jane Smith", "course": "Business Administration",
                 "institution": "Business College", "issue_date": "2023-06-20" } ] }"#,
        )
        .unwrap();
        let seed = Seed::load(&path).unwrap();
        assert_eq!(seed.certificates[0].student_name, "Jane Smith");
        assert_eq!(seed.certificates[0].grade, "");
    }
}
