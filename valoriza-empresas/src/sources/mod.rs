//! Tier 1 Source Adapters
//!
//! Every registry is reached through the [`SourceAdapter`] trait:
//! 1. **scraper_client** - SUNAT and OSCE through the scraping HTTP service
//! 2. **manual** - the user-supplied form
//!
//! # Parallel Execution
//! [`SourceFanOut`] runs every adapter in its own task with a per-call
//! timeout and a status-dependent retry budget. Errors, timeouts and panics
//! are converted into FAILED/TIMEOUT results; nothing propagates.

pub mod manual;
pub mod scraper_client;

pub use manual::ManualInput;
pub use scraper_client::ScraperServiceAdapter;

use crate::types::{FailureKind, Fuente, RawSourceResult, SourceStatus};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Adapter errors
///
/// Returned from [`SourceAdapter::fetch`]; the fan-out turns them into
/// FAILED results.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// Registry adapter
///
/// "Not found" is reported as a FAILED result, not as an error.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source this adapter reports as
    fn fuente(&self) -> Fuente;

    /// Query the registry for one RUC
    ///
    /// `timeout` is the caller's deadline; adapters may pass it to their
    /// transport, the fan-out enforces it regardless.
    async fn fetch(&self, ruc: &str, timeout: Duration) -> Result<RawSourceResult, SourceError>;
}

/// Extra attempts allowed per terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub on_timeout: u32,
    pub on_failure: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            on_timeout: 1,
            on_failure: 0,
        }
    }
}

impl RetryPolicy {
    fn allowed_after(&self, status: SourceStatus) -> u32 {
        match status {
            SourceStatus::Timeout => self.on_timeout,
            SourceStatus::Failed => self.on_failure,
            SourceStatus::Success | SourceStatus::Partial => 0,
        }
    }
}

/// Concurrent adapter executor
pub struct SourceFanOut {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl SourceFanOut {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            adapters,
            timeout,
            retry,
        }
    }

    pub fn fuentes(&self) -> Vec<Fuente> {
        self.adapters.iter().map(|a| a.fuente()).collect()
    }

    /// Query every adapter concurrently
    ///
    /// Returns one result per adapter, in adapter order, once every call
    /// has settled. Dropping the returned future aborts the adapter tasks
    /// still running.
    pub async fn fetch_all(&self, ruc: &str) -> Vec<RawSourceResult> {
        let mut tasks = AdapterTasks(
            self.adapters
                .iter()
                .map(|adapter| {
                    let adapter = Arc::clone(adapter);
                    let ruc = ruc.to_string();
                    let timeout = self.timeout;
                    let retry = self.retry;
                    tokio::spawn(async move { fetch_with_retry(adapter, &ruc, timeout, retry).await })
                })
                .collect(),
        );

        join_all(tasks.0.iter_mut())
            .await
            .into_iter()
            .zip(self.adapters.iter())
            .map(|(joined, adapter)| match joined {
                Ok(result) => result,
                Err(e) => {
                    // Panic or cancellation inside the adapter task
                    warn!(
                        source = %adapter.fuente(),
                        ruc = %ruc,
                        error = %e,
                        "Adapter task aborted"
                    );
                    RawSourceResult::errored(adapter.fuente(), format!("adapter task aborted: {}", e))
                }
            })
            .collect()
    }
}

/// In-flight adapter tasks, aborted on drop
struct AdapterTasks(Vec<JoinHandle<RawSourceResult>>);

impl Drop for AdapterTasks {
    fn drop(&mut self) {
        for handle in &self.0 {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

/// One adapter, with timeout and retry
async fn fetch_with_retry(
    adapter: Arc<dyn SourceAdapter>,
    ruc: &str,
    timeout: Duration,
    retry: RetryPolicy,
) -> RawSourceResult {
    let fuente = adapter.fuente();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let result = match tokio::time::timeout(timeout, adapter.fetch(ruc, timeout)).await {
            Ok(Ok(result)) => sanitize(fuente, result),
            Ok(Err(e)) => RawSourceResult::errored(fuente, e.to_string()),
            Err(_) => RawSourceResult::timed_out(
                fuente,
                format!("no response within {} ms", timeout.as_millis()),
            ),
        };

        let allowed = retry.allowed_after(result.status);
        if attempt > allowed {
            debug!(
                source = %fuente,
                ruc = %ruc,
                status = ?result.status,
                attempts = attempt,
                "Adapter settled"
            );
            return result.with_attempts(attempt);
        }

        warn!(
            source = %fuente,
            ruc = %ruc,
            status = ?result.status,
            attempt,
            error = ?result.error,
            "Adapter attempt failed, retrying"
        );
    }
}

/// Force the adapter's own source tag and drop data from failed results
fn sanitize(fuente: Fuente, mut result: RawSourceResult) -> RawSourceResult {
    if result.source != fuente {
        warn!(
            expected = %fuente,
            reported = %result.source,
            "Adapter reported a foreign source tag"
        );
        result.source = fuente;
    }
    match result.status {
        SourceStatus::Success | SourceStatus::Partial => result.failure = None,
        SourceStatus::Failed => {
            result.failure.get_or_insert(FailureKind::NotFound);
        }
        SourceStatus::Timeout => result.failure = Some(FailureKind::Timeout),
    }
    if !result.status.carries_data() {
        result.fields.clear();
        result.representantes.clear();
    }
    result
}

// ============================================================================
// Mock Adapter for Testing
// ============================================================================


#[cfg(test)]
mod tests {
    use super::mock::{MockAdapter, MockStep};
    use super::*;
    use crate::types::CampoEmpresa;

    fn fan_out(adapters: Vec<Arc<dyn SourceAdapter>>) -> SourceFanOut {
        SourceFanOut::new(adapters, Duration::from_millis(100), RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_in_adapter_order() {
        let sunat = Arc::new(MockAdapter::new(
            Fuente::Sunat,
            vec![MockStep::Respond(
                RawSourceResult::success(Fuente::Sunat).with_field(CampoEmpresa::RazonSocial, "X SAC"),
            )],
        ));
        let osce = Arc::new(MockAdapter::new(Fuente::Osce, vec![MockStep::Error]));

        let results = fan_out(vec![sunat, osce.clone()]).fetch_all("20100070970").await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, SourceStatus::Success);
        assert_eq!(results[1].source, Fuente::Osce);
        assert_eq!(results[1].status, SourceStatus::Failed);
        // No retry after FAILED by default
        assert_eq!(osce.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_retried_once() {
        let recovered = RawSourceResult::success(Fuente::Osce).with_field(CampoEmpresa::Email, "a@b.pe");
        let osce = Arc::new(MockAdapter::new(
            Fuente::Osce,
            vec![MockStep::Hang, MockStep::Respond(recovered)],
        ));

        let results = fan_out(vec![osce.clone()]).fetch_all("20100070970").await;

        assert_eq!(results[0].status, SourceStatus::Success);
        assert_eq!(results[0].attempts, 2);
        assert_eq!(osce.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_timeout_gives_up() {
        let sunat = Arc::new(MockAdapter::new(Fuente::Sunat, vec![MockStep::Hang]));

        let results = fan_out(vec![sunat.clone()]).fetch_all("20100070970").await;

        assert_eq!(results[0].status, SourceStatus::Timeout);
        assert_eq!(results[0].attempts, 2);
        assert_eq!(results[0].failure, Some(FailureKind::Timeout));
        assert!(results[0].fields.is_empty());
    }

    #[tokio::test]
    async fn test_panic_becomes_failed() {
        let sunat = Arc::new(MockAdapter::new(Fuente::Sunat, vec![MockStep::Panic]));
        let osce = Arc::new(MockAdapter::new(
            Fuente::Osce,
            vec![MockStep::Respond(RawSourceResult::partial(Fuente::Osce))],
        ));

        let results = fan_out(vec![sunat, osce]).fetch_all("20100070970").await;

        assert_eq!(results[0].status, SourceStatus::Failed);
        assert!(results[0].error.as_deref().unwrap_or_default().contains("aborted"));
        assert_eq!(results[0].failure, Some(FailureKind::Error));
        assert_eq!(results[1].status, SourceStatus::Partial);
    }

    #[tokio::test]
    async fn test_foreign_source_tag_rewritten() {
        let osce = Arc::new(MockAdapter::new(
            Fuente::Osce,
            vec![MockStep::Respond(RawSourceResult::success(Fuente::Sunat))],
        ));

        let results = fan_out(vec![osce]).fetch_all("20100070970").await;
        assert_eq!(results[0].source, Fuente::Osce);
    }

    /// Signals when the in-flight fetch future is dropped
    struct HangingAdapter {
        dropped: std::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    }

    struct SignalOnDrop(Option<tokio::sync::oneshot::Sender<()>>);

    impl Drop for SignalOnDrop {
        fn drop(&mut self) {
            if let Some(tx) = self.0.take() {
                let _ = tx.send(());
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for HangingAdapter {
        fn fuente(&self) -> Fuente {
            Fuente::Sunat
        }

        async fn fetch(&self, _ruc: &str, _timeout: Duration) -> Result<RawSourceResult, SourceError> {
            let _signal = SignalOnDrop(self.dropped.lock().unwrap().take());
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(SourceError::Internal("unreachable".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_fetch_aborts_adapter_tasks() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let adapter = Arc::new(HangingAdapter {
            dropped: std::sync::Mutex::new(Some(tx)),
        });
        let fan_out = SourceFanOut::new(vec![adapter], Duration::from_secs(7200), RetryPolicy::default());

        let outer = tokio::time::timeout(Duration::from_secs(1), fan_out.fetch_all("20100070970")).await;
        assert!(outer.is_err());

        // The adapter future is dropped long before its own sleep would end
        let signalled = tokio::time::timeout(Duration::from_secs(5), rx).await;
        assert!(matches!(signalled, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_adapter_error_is_typed() {
        let osce = Arc::new(MockAdapter::new(Fuente::Osce, vec![MockStep::Error]));
        let not_found = Arc::new(MockAdapter::new(
            Fuente::Sunat,
            vec![MockStep::Respond(RawSourceResult::failed(Fuente::Sunat, "no encontrado"))],
        ));

        let results = fan_out(vec![not_found, osce]).fetch_all("20100070970").await;
        assert_eq!(results[0].failure, Some(FailureKind::NotFound));
        assert_eq!(results[1].failure, Some(FailureKind::Error));
    }
}
