// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification orchestrator — runs the eight steps in `Step::ORDER`, stops
// at the first one that settles the verdict, and always returns an outcome.
//
// CPU-heavy work (decoding, watermark analysis, OCR) runs on tokio's blocking
// pool. A panic there aborts the run with status `error`. Oracle calls go
// through `consult`, so their failures only degrade the step that made them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::task::{JoinError, spawn_blocking};
use tracing::{debug, error, info, instrument, warn};
use valid8_core::config::VerifierConfig;
use valid8_core::error::{Result, Valid8Error};
use valid8_core::flags::FlagCode;
use valid8_core::oracle::{ContactRegistry, Oracle, OutcomeSink, TemplateRegistry};
use valid8_core::outcome::{Step, StepReport, VerificationOutcome, VerificationStatus};
use valid8_core::types::{ClaimField, ClaimsRecord, Document, EvidenceResult, SignatureEnvelope};
use valid8_document::{
    DocumentLoader, FieldParser, TemplateLibrary, TextExtractor, TextRecognizer,
    WatermarkAnalyzer, assess_quality,
};
use valid8_security::hash_bytes;

use crate::institutions::{InstitutionApiOracle, InstitutionDirectory};
use crate::oracles::consult;
use crate::pipeline::{RunState, StepOutcome};
use crate::registry::{CertificateRegistry, LinkOracle, RecordLookupOracle};
use crate::seed::Seed;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One uploaded certificate plus whatever evidence came with it.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub document: Arc<Document>,
    /// Verification link printed on or sent with the certificate.
    pub reference: Option<String>,
    pub signature: Option<SignatureEnvelope>,
}

impl VerificationRequest {
    pub fn new(document: Document) -> Self {
        Self {
            document: Arc::new(document),
            reference: None,
            signature: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_signature(mut self, signature: SignatureEnvelope) -> Self {
        self.signature = Some(signature);
        self
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`Verifier`]. Only the text recognizer is mandatory; an
/// evidence source left unset makes its step report `skipped`.
pub struct VerifierBuilder {
    recognizer: Arc<dyn TextRecognizer>,
    analyzer: Option<WatermarkAnalyzer>,
    templates: Arc<TemplateLibrary>,
    link: Option<Arc<dyn Oracle>>,
    signature: Option<Arc<dyn Oracle>>,
    records: Option<Arc<dyn Oracle>>,
    institution_api: Option<Arc<dyn Oracle>>,
    template_registry: Arc<dyn TemplateRegistry>,
    contacts: Arc<dyn ContactRegistry>,
    sink: Option<Arc<dyn OutcomeSink>>,
    oracle_timeout: Duration,
}

impl VerifierBuilder {
    fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        let empty = Arc::new(InstitutionDirectory::default());
        Self {
            recognizer,
            analyzer: None,
            templates: Arc::new(TemplateLibrary::empty()),
            link: None,
            signature: None,
            records: None,
            institution_api: None,
            template_registry: empty.clone(),
            contacts: empty,
            sink: None,
            oracle_timeout: VerifierConfig::default().oracle_timeout(),
        }
    }

    /// Oracle timeout and watermark analysis settings.
    pub fn config(mut self, config: &VerifierConfig) -> Self {
        self.oracle_timeout = config.oracle_timeout();
        self.analyzer = Some(WatermarkAnalyzer::from_config(config));
        self
    }

    pub fn analyzer(mut self, analyzer: WatermarkAnalyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn templates(mut self, templates: TemplateLibrary) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    /// Wire the registry, institution directory and their oracles from a
    /// seed.
    pub fn seed(mut self, seed: &Seed) -> Self {
        let registry = Arc::new(CertificateRegistry::new(seed.certificates.clone()));
        let directory = Arc::new(InstitutionDirectory::from_seed(seed));
        self.link = Some(Arc::new(LinkOracle::new(Arc::clone(&registry))));
        self.records = Some(Arc::new(RecordLookupOracle::new(registry)));
        self.institution_api = Some(Arc::new(InstitutionApiOracle::new(Arc::clone(&directory))));
        self.template_registry = directory.clone();
        self.contacts = directory;
        self
    }

    pub fn link_oracle(mut self, oracle: impl Oracle + 'static) -> Self {
        self.link = Some(Arc::new(oracle));
        self
    }

    pub fn signature_oracle(mut self, oracle: impl Oracle + 'static) -> Self {
        self.signature = Some(Arc::new(oracle));
        self
    }

    pub fn record_oracle(mut self, oracle: impl Oracle + 'static) -> Self {
        self.records = Some(Arc::new(oracle));
        self
    }

    pub fn institution_oracle(mut self, oracle: impl Oracle + 'static) -> Self {
        self.institution_api = Some(Arc::new(oracle));
        self
    }

    pub fn template_registry(mut self, registry: impl TemplateRegistry + 'static) -> Self {
        self.template_registry = Arc::new(registry);
        self
    }

    pub fn contact_registry(mut self, registry: impl ContactRegistry + 'static) -> Self {
        self.contacts = Arc::new(registry);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Verifier> {
        let analyzer = self.analyzer.unwrap_or_else(|| {
            WatermarkAnalyzer::new(VerifierConfig::default().analysis_max_dimension)
        });
        Ok(Verifier {
            shared: Arc::new(Shared {
                extractor: TextExtractor::new(self.recognizer),
                parser: FieldParser::new()?,
                analyzer,
                templates: self.templates,
                link: self.link,
                signature: self.signature,
                records: self.records,
                institution_api: self.institution_api,
                template_registry: self.template_registry,
                contacts: self.contacts,
                sink: self.sink,
                oracle_timeout: self.oracle_timeout,
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Read-only state shared by every run.
struct Shared {
    extractor: TextExtractor,
    parser: FieldParser,
    analyzer: WatermarkAnalyzer,
    templates: Arc<TemplateLibrary>,
    link: Option<Arc<dyn Oracle>>,
    signature: Option<Arc<dyn Oracle>>,
    records: Option<Arc<dyn Oracle>>,
    institution_api: Option<Arc<dyn Oracle>>,
    template_registry: Arc<dyn TemplateRegistry>,
    contacts: Arc<dyn ContactRegistry>,
    sink: Option<Arc<dyn OutcomeSink>>,
    oracle_timeout: Duration,
}

/// The verification pipeline. Cheap to clone; runs are independent.
#[derive(Clone)]
pub struct Verifier {
    shared: Arc<Shared>,
}

impl Verifier {
    pub fn builder(recognizer: Arc<dyn TextRecognizer>) -> VerifierBuilder {
        VerifierBuilder::new(recognizer)
    }

    /// Verify one certificate. Never fails: internal faults come back as an
    /// outcome with status `error` and the steps completed so far.
    #[instrument(skip_all, fields(
        document = request.document.name().unwrap_or("<unnamed>"),
        bytes = request.document.len(),
    ))]
    pub async fn verify(&self, request: VerificationRequest) -> VerificationOutcome {
        let clock = Instant::now();
        let document_hash = hash_bytes(request.document.bytes());
        let mut run = RunState::new(
            request.document,
            document_hash,
            request.reference,
            request.signature,
        );

        let mut status = VerificationStatus::ManualVerification;
        for step in Step::ORDER {
            match self.run_step(step, &mut run).await {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Terminate(final_status)) => {
                    status = final_status;
                    break;
                }
                Err(err) => {
                    error!(step = step.title(), error = %err, "verification aborted");
                    run.report(StepReport::error(step, format!("Processing error: {err}")));
                    run.raise(FlagCode::ProcessingError);
                    run.error = Some(err.to_string());
                    status = VerificationStatus::Error;
                    break;
                }
            }
        }

        let outcome = run.finish(status, clock.elapsed().as_millis() as u64);
        info!(
            id = %outcome.id,
            status = %outcome.status,
            steps = outcome.steps.len(),
            flags = ?outcome.flags,
            elapsed_ms = outcome.elapsed_ms,
            "verification finished"
        );
        self.persist(&outcome).await;
        outcome
    }

    async fn run_step(&self, step: Step, run: &mut RunState) -> Result<StepOutcome> {
        match step {
            Step::Authenticity => self.authenticity(run).await,
            Step::DirectLink => Ok(self.direct_link(run).await),
            Step::Extraction => self.extraction(run).await,
            Step::TemplateConformance => Ok(self.template_conformance(run)),
            Step::Signature => Ok(self.signature(run).await),
            Step::RecordLookup => Ok(self.record_lookup(run).await),
            Step::InstitutionApi => Ok(self.institution_api(run).await),
            Step::ManualFallback => Ok(self.manual_fallback(run)),
        }
    }

    // -- 1. Authenticity ------------------------------------------------------

    /// Decode the document and analyze its first frame. Informational only;
    /// a load failure is handed on to extraction.
    async fn authenticity(&self, run: &mut RunState) -> Result<StepOutcome> {
        let shared = Arc::clone(&self.shared);
        let document = Arc::clone(&run.document);
        let (loaded, verdict) = blocking(move || match DocumentLoader::load(&document) {
            Ok(frames) => {
                let verdict = frames
                    .first()
                    .map(|frame| shared.analyzer.analyze(frame, &shared.templates));
                (Ok(frames), verdict)
            }
            Err(err) => (Err(err), None),
        })
        .await?;

        match loaded {
            Ok(frames) => {
                let report = match &verdict {
                    Some(v) if v.has_watermark => StepReport::passed(
                        Step::Authenticity,
                        format!(
                            "Watermark detected: {} (confidence {:.2})",
                            v.watermark_type, v.confidence
                        ),
                    ),
                    Some(v) => StepReport::warning(
                        Step::Authenticity,
                        format!("No watermark detected (confidence {:.2})", v.confidence),
                    ),
                    None => StepReport::warning(Step::Authenticity, "Document has no pages to analyze"),
                };
                let report = match &verdict {
                    Some(v) => report.with_details(serde_json::to_value(v)?),
                    None => report,
                };
                run.report(report);
                run.frames = Some(frames);
                run.authenticity = verdict;
            }
            Err(err) => {
                warn!(error = %err, "document could not be loaded");
                run.report(StepReport::error(
                    Step::Authenticity,
                    format!("Could not load document: {err}"),
                ));
                run.load_error = Some(err);
            }
        }
        Ok(StepOutcome::Continue)
    }

    // -- 2. Direct link -------------------------------------------------------

    async fn direct_link(&self, run: &mut RunState) -> StepOutcome {
        if run.reference.is_none() {
            run.report(StepReport::skipped(Step::DirectLink, "Skipped (no link provided)"));
            return StepOutcome::Continue;
        }
        let Some(answer) = self.ask(self.shared.link.as_ref(), run).await else {
            run.report(StepReport::skipped(Step::DirectLink, "Skipped (no link registry configured)"));
            return StepOutcome::Continue;
        };

        match answer {
            Ok(result) if result.verified => {
                if let Some(record) = &result.matched_record {
                    run.claims = ClaimsRecord::from_record(record);
                }
                run.matched_record = result.matched_record;
                run.report(StepReport::passed(
                    Step::DirectLink,
                    "Certificate verified via registry link",
                ));
                StepOutcome::Terminate(VerificationStatus::Verified)
            }
            Ok(result) => {
                run.report(StepReport::warning(
                    Step::DirectLink,
                    result
                        .error
                        .unwrap_or_else(|| "Certificate not confirmed by registry link".into()),
                ));
                StepOutcome::Continue
            }
            Err(err) => {
                run.report(StepReport::error(
                    Step::DirectLink,
                    format!("Registry link check failed: {err}"),
                ));
                StepOutcome::Continue
            }
        }
    }

    // -- 3. Extraction --------------------------------------------------------

    async fn extraction(&self, run: &mut RunState) -> Result<StepOutcome> {
        if let Some(err) = run.load_error.take() {
            return Ok(extraction_failed(run, &err));
        }

        let frames = run.frames.take().unwrap_or_default();
        let shared = Arc::clone(&self.shared);
        let extracted = blocking(move || -> Result<(ClaimsRecord, usize, usize)> {
            let text = shared.extractor.extract_document(&frames)?;
            let mut claims = shared.parser.parse(text.parse_source());
            claims.confidence = text.confidence();
            Ok((claims, text.pages.len(), text.canonical().page_index))
        })
        .await?;

        let (claims, pages, canonical_page) = match extracted {
            Ok(extracted) => extracted,
            Err(err) => return Ok(extraction_failed(run, &err)),
        };

        let quality = assess_quality(&claims);
        let message = format!(
            "Text extracted ({:.1}% confidence, quality {}/100)",
            claims.confidence, quality.score
        );
        let details = json!({
            "pages": pages,
            "canonical_page": canonical_page,
            "certificate_type": claims.certificate_type,
            "quality": quality,
        });
        let report = if quality.reliable {
            StepReport::passed(Step::Extraction, message)
        } else {
            StepReport::warning(Step::Extraction, message)
        };
        run.report(report.with_details(details));
        run.claims = claims;
        Ok(StepOutcome::Continue)
    }

    // -- 4. Template conformance ----------------------------------------------

    fn template_conformance(&self, run: &mut RunState) -> StepOutcome {
        let institution = run.claims.institution.clone();
        let Some(required) = self.shared.template_registry.required_fields(&institution) else {
            run.raise(FlagCode::TemplateMismatch);
            let message = if institution.is_empty() {
                "No institution found on certificate".to_owned()
            } else {
                format!("No template found for {institution}")
            };
            run.report(StepReport::warning(Step::TemplateConformance, message));
            return StepOutcome::Continue;
        };

        // Names the claims cannot represent count as missing.
        let missing: Vec<String> = required
            .iter()
            .filter(|name| ClaimField::from_template_name(name).is_none_or(|f| !run.claims.has(f)))
            .cloned()
            .collect();

        if missing.is_empty() {
            run.report(StepReport::passed(
                Step::TemplateConformance,
                format!("Certificate matches the {institution} template"),
            ));
        } else {
            run.raise(FlagCode::TemplateMismatch);
            run.report(
                StepReport::warning(
                    Step::TemplateConformance,
                    format!("Missing required fields: {}", missing.join(", ")),
                )
                .with_details(json!({ "missing_fields": missing })),
            );
        }
        StepOutcome::Continue
    }

    // -- 5. Signature ---------------------------------------------------------

    async fn signature(&self, run: &mut RunState) -> StepOutcome {
        let Some(answer) = self.ask(self.shared.signature.as_ref(), run).await else {
            let message = match &run.signature {
                Some(_) => "Skipped (no trusted signers configured)",
                None => "No digital signature attached",
            };
            run.report(StepReport::skipped(Step::Signature, message));
            return StepOutcome::Continue;
        };

        let report = match answer {
            Ok(result) if !result.applicable => {
                StepReport::skipped(Step::Signature, "No digital signature attached")
            }
            Ok(result) if result.verified => {
                let signer = run.signature.as_ref().map_or("issuer", |s| s.signer.as_str());
                StepReport::passed(Step::Signature, format!("Signature by {signer} is valid"))
            }
            Ok(result) => {
                run.raise(FlagCode::SignatureInvalid);
                StepReport::failed(
                    Step::Signature,
                    result.error.unwrap_or_else(|| "Digital signature is invalid".into()),
                )
            }
            Err(err) => StepReport::error(Step::Signature, format!("Signature check failed: {err}")),
        };
        run.report(report);
        StepOutcome::Continue
    }

    // -- 6. Record lookup -----------------------------------------------------

    async fn record_lookup(&self, run: &mut RunState) -> StepOutcome {
        let Some(answer) = self.ask(self.shared.records.as_ref(), run).await else {
            run.report(StepReport::skipped(
                Step::RecordLookup,
                "Skipped (no certificate registry configured)",
            ));
            return StepOutcome::Continue;
        };

        match answer {
            Ok(result) if result.verified => {
                if let Some(record) = &result.matched_record {
                    run.claims.merge_record(record);
                }
                run.matched_record = result.matched_record;
                run.report(StepReport::passed(
                    Step::RecordLookup,
                    "Certificate found in internal database",
                ));
                StepOutcome::Terminate(VerificationStatus::Verified)
            }
            Ok(result) => {
                run.report(StepReport::warning(
                    Step::RecordLookup,
                    result
                        .error
                        .unwrap_or_else(|| "Certificate not found in internal database".into()),
                ));
                StepOutcome::Continue
            }
            Err(err) => {
                run.report(StepReport::error(
                    Step::RecordLookup,
                    format!("Database check failed: {err}"),
                ));
                StepOutcome::Continue
            }
        }
    }

    // -- 7. Institution API ---------------------------------------------------

    async fn institution_api(&self, run: &mut RunState) -> StepOutcome {
        let Some(answer) = self.ask(self.shared.institution_api.as_ref(), run).await else {
            run.report(StepReport::skipped(
                Step::InstitutionApi,
                "Skipped (no institution API configured)",
            ));
            return StepOutcome::Continue;
        };

        match answer {
            Ok(result) if result.verified => {
                let institution = result
                    .matched_record
                    .as_ref()
                    .map_or_else(|| run.claims.institution.clone(), |r| r.institution.clone());
                run.matched_record = result.matched_record;
                run.report(StepReport::passed(
                    Step::InstitutionApi,
                    format!("Certificate confirmed by {institution}"),
                ));
                StepOutcome::Terminate(VerificationStatus::Verified)
            }
            Ok(result) => {
                run.report(StepReport::warning(
                    Step::InstitutionApi,
                    result
                        .error
                        .unwrap_or_else(|| "Institution did not confirm the certificate".into()),
                ));
                StepOutcome::Continue
            }
            Err(err) => {
                run.report(StepReport::error(
                    Step::InstitutionApi,
                    format!("Institution API verification failed: {err}"),
                ));
                StepOutcome::Continue
            }
        }
    }

    // -- 8. Manual fallback ---------------------------------------------------

    fn manual_fallback(&self, run: &mut RunState) -> StepOutcome {
        let institution = run.claims.institution.clone();
        let contact = self.shared.contacts.contact_info(&institution);
        run.report(
            StepReport::warning(
                Step::ManualFallback,
                "Please contact institution directly for verification",
            )
            .with_details(json!({ "institution": institution, "contact_info": contact })),
        );
        run.contact_info = Some(contact);
        StepOutcome::Terminate(VerificationStatus::ManualVerification)
    }

    // -- helpers --------------------------------------------------------------

    /// Consult an optional oracle with the run's current claims. `None` when
    /// the oracle is not configured.
    async fn ask(
        &self,
        oracle: Option<&Arc<dyn Oracle>>,
        run: &RunState,
    ) -> Option<Result<EvidenceResult>> {
        let oracle = Arc::clone(oracle?);
        Some(consult(oracle, run.query(), self.shared.oracle_timeout).await)
    }

    /// Hand the outcome to the sink. Failures are logged and never change
    /// the outcome.
    async fn persist(&self, outcome: &VerificationOutcome) {
        let Some(sink) = self.shared.sink.clone() else {
            return;
        };
        let record = outcome.clone();
        match spawn_blocking(move || sink.append(&record)).await {
            Ok(Ok(())) => debug!("outcome persisted"),
            Ok(Err(err)) => warn!(error = %err, "failed to persist outcome"),
            Err(err) => warn!(error = %describe_join_error(err), "outcome sink crashed"),
        }
    }
}

fn extraction_failed(run: &mut RunState, err: &Valid8Error) -> StepOutcome {
    warn!(error = %err, "text extraction failed");
    run.raise(FlagCode::OcrExtractionFailed);
    run.report(StepReport::failed(
        Step::Extraction,
        format!("OCR extraction failed: {err}"),
    ));
    StepOutcome::Terminate(VerificationStatus::Flag)
}

/// Run CPU-bound work on the blocking pool. A panic becomes a
/// [`Valid8Error::ProcessingError`].
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(task)
        .await
        .map_err(|err| Valid8Error::ProcessingError(describe_join_error(err)))
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match message {
        Some(message) => format!("task panicked: {message}"),
        None => "task panicked".to_owned(),
    }
}
