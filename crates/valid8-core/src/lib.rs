// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// valid8 — Core types, errors, and collaborator contracts shared across all crates.

pub mod config;
pub mod error;
pub mod flags;
pub mod oracle;
pub mod outcome;
pub mod types;

pub use config::VerifierConfig;
pub use error::{Result, Valid8Error};
pub use flags::{FlagCode, Severity};
pub use oracle::{ContactRegistry, EvidenceQuery, Oracle, OutcomeSink, TemplateRegistry};
pub use outcome::{Step, StepReport, StepStatus, VerificationOutcome, VerificationStatus};
pub use types::*;
