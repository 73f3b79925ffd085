// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// valid8-verify — The verification pipeline.
//
// A `Verifier` runs eight ordered steps over an uploaded certificate:
// authenticity analysis, direct-link lookup, OCR extraction, template
// conformance, signature check, internal record lookup, institution API and
// manual fallback. It stops at the first step that settles the verdict.

pub mod institutions;
pub mod oracles;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod seed;

pub use institutions::{InstitutionApiOracle, InstitutionDirectory};
pub use orchestrator::{VerificationRequest, Verifier, VerifierBuilder};
pub use pipeline::StepOutcome;
pub use registry::{CertificateRegistry, LinkOracle, RecordLookupOracle};
pub use seed::{InstitutionEntry, IssuedCertificate, Seed};
