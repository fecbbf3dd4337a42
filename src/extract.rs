//! Extraction entry points.
//!
//! [`Extractor`] holds the model chain built from an [`ExtractionConfig`]
//! and runs the whole pipeline for one document at a time. The free
//! functions are conveniences that build an extractor per call.
//!
//! Every public entry point here returns an [`Envelope`]: fatal errors
//! (unreachable document, unconfigured provider, even a panic inside a
//! pipeline stage) become `is_success = false`, and model failures become
//! warnings inside a successful envelope.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::output::{Envelope, ExtractionResult};
use crate::pipeline::gateway::ModelGateway;
use crate::pipeline::{assemble, encode, input, preprocess};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A configured extraction pipeline.
///
/// Build once and share: the extractor holds no per-request state, so
/// concurrent calls on the same instance are independent.
pub struct Extractor {
    gateway: ModelGateway,
    download_timeout_secs: u64,
    mismatch_tolerance: f64,
}

impl Extractor {
    /// Build the model chain described by `config`.
    ///
    /// # Errors
    /// [`InvoiceError::ProviderNotConfigured`] when a named model cannot be
    /// instantiated, [`InvoiceError::InvalidConfig`] when the chain is empty.
    pub fn new(config: &ExtractionConfig) -> Result<Self, InvoiceError> {
        let gateway = ModelGateway::from_config(config)?;
        debug!("Model chain: {:?}", gateway.model_ids());
        Ok(Self {
            gateway,
            download_timeout_secs: config.download_timeout_secs,
            mismatch_tolerance: config.mismatch_tolerance,
        })
    }

    /// Fetch and extract the document at `location`, never failing.
    pub async fn extract(&self, location: &str) -> Envelope {
        guard_envelope(self.try_extract(location)).await
    }

    /// Extract already-fetched document bytes, never failing.
    pub async fn extract_bytes(&self, bytes: &[u8]) -> Envelope {
        guard_envelope(self.try_extract_bytes(bytes)).await
    }

    /// Fetch and extract, surfacing fatal errors as `Err`.
    pub async fn try_extract(&self, location: &str) -> Result<ExtractionResult, InvoiceError> {
        let start = Instant::now();
        info!("Starting extraction: {}", location);

        let document = input::fetch_document(location, self.download_timeout_secs).await?;
        let result = self.try_extract_bytes(&document.bytes).await?;

        info!(
            "Extraction complete: {} items, reconciled {:.2}, printed {:.2}, {} warnings, {}ms",
            result.item_count,
            result.reconciled_amount,
            result.printed_total,
            result.fraud_warnings.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Run preprocessing, the model chain and reconciliation over `bytes`.
    pub async fn try_extract_bytes(&self, bytes: &[u8]) -> Result<ExtractionResult, InvoiceError> {
        // Decoding is CPU-bound; keep it off the async workers.
        let owned = bytes.to_vec();
        let (prepared, image) = tokio::task::spawn_blocking(move || {
            let prepared = preprocess::preprocess(&owned);
            let image = encode::encode_image(&owned, prepared.mime_type());
            (prepared, image)
        })
        .await
        .map_err(|e| InvoiceError::Internal(format!("preprocessing task failed: {e}")))?;

        let outcome = self.gateway.extract(&image).await;
        match outcome.model {
            Some(ref model) => debug!(
                "Model '{}' answered after {} failed attempts in {}ms",
                model,
                outcome.failures.len(),
                outcome.duration_ms
            ),
            None => warn!(
                "No model produced usable output ({} attempts)",
                outcome.failures.len()
            ),
        }

        Ok(assemble::assemble_from_raw(
            &outcome.raw,
            prepared.labels,
            self.mismatch_tolerance,
        ))
    }
}

/// Fetch and extract one document with a fresh [`Extractor`].
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use edgequake_invoice::{extract_document, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// // Credentials come from GEMINI_API_KEY.
/// let config = ExtractionConfig::default();
/// let envelope = extract_document("https://example.com/bill.png", &config).await;
/// println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
/// # }
/// ```
pub async fn extract_document(location: impl AsRef<str>, config: &ExtractionConfig) -> Envelope {
    match Extractor::new(config) {
        Ok(extractor) => extractor.extract(location.as_ref()).await,
        Err(e) => Envelope::failure(e.to_string()),
    }
}

/// Extract document bytes already held in memory.
pub async fn extract_from_bytes(bytes: &[u8], config: &ExtractionConfig) -> Envelope {
    match Extractor::new(config) {
        Ok(extractor) => extractor.extract_bytes(bytes).await,
        Err(e) => Envelope::failure(e.to_string()),
    }
}

/// Synchronous wrapper around [`extract_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(location: impl AsRef<str>, config: &ExtractionConfig) -> Envelope {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(extract_document(location, config)),
        Err(e) => Envelope::failure(
            InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)).to_string(),
        ),
    }
}

/// Extract several documents concurrently.
///
/// At most `config.concurrency` documents are in flight at once. The returned
/// envelopes are in input order, one per location.
pub async fn extract_batch<I, S>(locations: I, config: &ExtractionConfig) -> Vec<Envelope>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let locations: Vec<String> = locations
        .into_iter()
        .map(|l| l.as_ref().to_string())
        .collect();
    let total = locations.len();
    let callback = config.progress_callback.clone();

    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
    }

    let extractor = match Extractor::new(config) {
        Ok(extractor) => extractor,
        Err(e) => {
            let msg = e.to_string();
            if let Some(ref cb) = callback {
                for index in 0..total {
                    cb.on_document_error(index, total, &msg);
                }
                cb.on_batch_complete(total, 0);
            }
            return vec![Envelope::failure(msg); total];
        }
    };

    let extractor = &extractor;
    let jobs = locations.iter().enumerate().map(|(index, location)| {
        let callback = callback.clone();
        async move {
            if let Some(ref cb) = callback {
                cb.on_document_start(index, total, location);
            }
            let envelope = extractor.extract(location).await;
            if let Some(ref cb) = callback {
                match (&envelope.data, &envelope.error) {
                    (Some(data), _) => cb.on_document_complete(index, total, data.item_count),
                    (None, Some(err)) => cb.on_document_error(index, total, err),
                    (None, None) => cb.on_document_error(index, total, "no result"),
                }
            }
            envelope
        }
    });
    let envelopes: Vec<Envelope> = stream::iter(jobs)
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    let succeeded = envelopes.iter().filter(|e| e.success).count();
    info!("Batch complete: {}/{} documents succeeded", succeeded, total);
    if let Some(ref cb) = callback {
        cb.on_batch_complete(total, succeeded);
    }
    envelopes
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Await a pipeline future, turning errors and panics into a failure envelope.
async fn guard_envelope<F>(fut: F) -> Envelope
where
    F: std::future::Future<Output = Result<ExtractionResult, InvoiceError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => {
            if let Err(ref e) = outcome {
                warn!("Extraction failed: {}", e);
            }
            assemble::into_envelope(outcome)
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            warn!("Extraction panicked: {}", msg);
            Envelope::failure(
                InvoiceError::Internal(format!("extraction panicked: {msg}")).to_string(),
            )
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_maps_error() {
        let env = guard_envelope(async {
            Err(InvoiceError::InvalidInput {
                input: String::new(),
            })
        })
        .await;
        assert!(!env.success);
        assert!(env.error.unwrap().contains("Invalid document location"));
    }

    #[tokio::test]
    async fn guard_maps_panic() {
        let env = guard_envelope(async {
            if true {
                panic!("normalizer exploded");
            }
            Err(InvoiceError::Internal("unreachable".into()))
        })
        .await;
        assert!(!env.success);
        let err = env.error.unwrap();
        assert!(err.contains("normalizer exploded"), "got: {err}");
    }

    #[test]
    fn panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }
}
