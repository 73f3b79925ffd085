// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// valid8-security — Trust primitives for certificate verification.
//
// Documents and certificate records are fingerprinted with SHA-256, issuer
// signatures are ECDSA P-256 (ring), and every completed verification is
// appended to a SQLite audit trail.

pub mod audit;
pub mod integrity;
pub mod signatures;

pub use audit::{AuditEntry, AuditLog};
pub use integrity::{certificate_hash, hash_bytes, record_hash, verify_hash};
pub use signatures::{IssuerKeyPair, SignatureOracle};
