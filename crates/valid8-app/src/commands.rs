// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations.

use std::path::Path;

use serde_json::json;
use tracing::info;
use valid8_core::config::VerifierConfig;
use valid8_core::error::{Result, Valid8Error};
use valid8_core::types::{Document, MediaType, SignatureEnvelope};
use valid8_document::TemplateLibrary;
use valid8_security::IssuerKeyPair;
use valid8_verify::VerificationRequest;

use crate::cli::{AddTemplateArgs, Cli, Commands, HistoryArgs, SignArgs, VerifyArgs};
use crate::services::app_services::{self, AppServices};
use crate::services::data_dir::DataLayout;

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Verify(args) => verify(&config, args).await,
        Commands::Keygen => keygen(),
        Commands::Sign(args) => sign(args),
        Commands::AddTemplate(args) => add_template(&config, args),
        Commands::History(args) => history(&config, args),
    }
}

fn load_config(path: Option<&Path>) -> Result<VerifierConfig> {
    match path {
        Some(path) => VerifierConfig::load(path),
        None => VerifierConfig::from_env(),
    }
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

async fn verify(config: &VerifierConfig, args: VerifyArgs) -> Result<()> {
    let request = build_request(&args)?;
    let services = AppServices::init(config, args.seed.as_deref(), !args.no_audit)?;
    let outcome = services.verify(request).await;

    if let Some(log) = services.audit_log() {
        let attempts = log.entries_for_hash(&outcome.document_hash)?.len();
        info!(attempts, "attempts recorded for this document");
    }

    eprintln!("{}", outcome.summary());
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn build_request(args: &VerifyArgs) -> Result<VerificationRequest> {
    let bytes = std::fs::read(&args.file)?;
    let media_type = media_type_for(&args.file, &bytes);
    let mut document = Document::new(bytes, media_type);
    if let Some(name) = args.file.file_name() {
        document = document.with_name(name.to_string_lossy());
    }

    let mut request = VerificationRequest::new(document);
    if let Some(reference) = &args.reference {
        request = request.with_reference(reference.clone());
    }
    if let (Some(signer), Some(signature_hex)) = (&args.signer, &args.signature) {
        request = request.with_signature(SignatureEnvelope {
            signer: signer.clone(),
            signature_hex: signature_hex.trim().to_owned(),
        });
    }
    Ok(request)
}

/// Magic bytes first, then the file extension.
fn media_type_for(path: &Path, bytes: &[u8]) -> MediaType {
    MediaType::sniff(bytes).unwrap_or_else(|| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(MediaType::from_extension)
            .unwrap_or_else(|| MediaType::Other("application/octet-stream".into()))
    })
}

// ---------------------------------------------------------------------------
// keys
// ---------------------------------------------------------------------------

fn keygen() -> Result<()> {
    let key = IssuerKeyPair::generate()?;
    let output = json!({
        "private_key_pkcs8": key.pkcs8_hex(),
        "public_key": key.public_key_hex(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn sign(args: SignArgs) -> Result<()> {
    let key_hex = match (&args.key, &args.key_file) {
        (Some(key), _) => key.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Err(Valid8Error::Signature("no signing key given".into())),
    };
    let key = IssuerKeyPair::from_pkcs8_hex(key_hex.trim())?;
    let bytes = std::fs::read(&args.file)?;
    println!("{}", key.sign_hex(&bytes)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// templates and history
// ---------------------------------------------------------------------------

fn add_template(config: &VerifierConfig, args: AddTemplateArgs) -> Result<()> {
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .image
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| Valid8Error::Template("template image has no file name".into()))?,
    };
    let image = image::open(&args.image).map_err(|err| {
        Valid8Error::Template(format!("cannot read {}: {}", args.image.display(), err))
    })?;

    let layout = DataLayout::from_env();
    let mut library = TemplateLibrary::load_dir(app_services::template_dir(config, &layout))?;
    let path = library.save_template(&name, &image)?;
    info!(templates = library.len(), "template library updated");
    println!("{}", path.display());
    Ok(())
}

fn history(config: &VerifierConfig, args: HistoryArgs) -> Result<()> {
    let log = app_services::open_audit_log(config, &DataLayout::from_env())?;
    let entries = match &args.hash {
        Some(hash) => log.entries_for_hash(hash)?,
        None => log.recent_entries(args.limit)?,
    };
    for entry in &entries {
        println!("{}", serde_json::to_string(entry)?);
    }
    info!(count = entries.len(), "history listed");
    Ok(())
}
