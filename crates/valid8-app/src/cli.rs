// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "valid8",
    version,
    about = "Verify academic certificates against registries, signatures and institutions"
)]
pub struct Cli {
    /// JSON configuration file. Without one, defaults plus `VALID8_*`
    /// environment overrides apply.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the verification pipeline over one document and print the outcome.
    Verify(VerifyArgs),
    /// Generate a P-256 issuer key pair.
    Keygen,
    /// Produce a detached signature over a file.
    Sign(SignArgs),
    /// Register a reference watermark image.
    AddTemplate(AddTemplateArgs),
    /// Show recorded verification attempts.
    History(HistoryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Certificate image or PDF.
    pub file: PathBuf,

    /// Verification link printed on the certificate.
    #[arg(long)]
    pub reference: Option<String>,

    #[arg(long, requires = "signature")]
    pub signer: Option<String>,

    /// Hex-encoded detached signature over the file.
    #[arg(long, requires = "signer")]
    pub signature: Option<String>,

    /// Seed file with institutions and known certificates.
    #[arg(long)]
    pub seed: Option<PathBuf>,

    /// Do not record this run in the audit database.
    #[arg(long, default_value_t = false)]
    pub no_audit: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SignArgs {
    pub file: PathBuf,

    /// PKCS#8 private key as hex.
    #[arg(long, conflicts_with = "key_file", required_unless_present = "key_file")]
    pub key: Option<String>,

    /// File holding the PKCS#8 private key as hex.
    #[arg(long)]
    pub key_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct AddTemplateArgs {
    pub image: PathBuf,

    /// Template name; defaults to the image file stem.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Only attempts for this document hash.
    #[arg(long)]
    pub hash: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub limit: u32,
}
