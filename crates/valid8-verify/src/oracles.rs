// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Oracle invocation — every evidence check runs on the blocking pool under a
// deadline, so a slow or crashing source cannot stall or abort a run.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use valid8_core::error::{Result, Valid8Error};
use valid8_core::oracle::{EvidenceQuery, Oracle};
use valid8_core::types::EvidenceResult;

/// Ask `oracle` about `query`, giving up after `timeout`.
///
/// `Ok` is the oracle's own answer, negative answers included. `Err` means
/// the oracle could not answer at all: it timed out, panicked or returned an
/// error. A timed-out check keeps running on its blocking thread; its result
/// is discarded.
pub async fn consult(
    oracle: Arc<dyn Oracle>,
    query: Arc<EvidenceQuery>,
    timeout: Duration,
) -> Result<EvidenceResult> {
    let source = oracle.source();
    let task = tokio::task::spawn_blocking(move || oracle.check(&query));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(result))) => {
            debug!(%source, verified = result.verified, applicable = result.applicable, "oracle answered");
            Ok(result)
        }
        Ok(Ok(Err(err))) => {
            warn!(%source, error = %err, "oracle failed");
            Err(err)
        }
        Ok(Err(join)) => {
            warn!(%source, error = %join, "oracle task aborted");
            Err(Valid8Error::OracleUnavailable(format!("{source} oracle crashed: {join}")))
        }
        Err(_) => {
            warn!(%source, timeout_ms = timeout.as_millis() as u64, "oracle timed out");
            Err(Valid8Error::OracleTimeout {
                oracle: source.as_str().to_owned(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valid8_core::types::{ClaimsRecord, Document, EvidenceSource, MediaType};

    struct Scripted(fn() -> Result<EvidenceResult>);

    impl Oracle for Scripted {
        fn source(&self) -> EvidenceSource {
            EvidenceSource::InstitutionApi
        }
        fn check(&self, _query: &EvidenceQuery) -> Result<EvidenceResult> {
            (self.0)()
        }
    }

    fn query() -> Arc<EvidenceQuery> {
        Arc::new(EvidenceQuery::new(
            Arc::new(Document::new(Vec::new(), MediaType::Png)),
            ClaimsRecord::default(),
        ))
    }

    async fn run(script: fn() -> Result<EvidenceResult>, timeout_ms: u64) -> Result<EvidenceResult> {
        consult(Arc::new(Scripted(script)), query(), Duration::from_millis(timeout_ms)).await
    }

    #[tokio::test]
    async fn answers_pass_through() {
        let result = run(|| Ok(EvidenceResult::verified(EvidenceSource::InstitutionApi, None)), 1000)
            .await
            .unwrap();
        assert!(result.verified);
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let err = run(
            || {
                std::thread::sleep(Duration::from_millis(300));
                Ok(EvidenceResult::not_verified(EvidenceSource::InstitutionApi))
            },
            20,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Valid8Error::OracleTimeout { timeout_ms: 20, .. }));
        assert!(err.is_oracle_failure());
    }

    #[tokio::test]
    async fn panicking_oracle_is_unavailable() {
        let err = run(|| panic!("connection reset"), 1000).await.unwrap_err();
        assert!(matches!(err, Valid8Error::OracleUnavailable(_)));
    }

    #[tokio::test]
    async fn oracle_errors_are_returned() {
        let err = run(|| Err(Valid8Error::Database("locked".into())), 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, Valid8Error::Database(_)));
    }
}
