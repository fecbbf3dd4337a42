//! Error types for the edgequake-invoice library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`InvoiceError`]: **Fatal**: the document could not even reach the
//!   model (unreachable URL, missing file, provider not configured). These
//!   are the only errors that turn into a failure envelope.
//!
//! * [`AttemptError`]: **Non-fatal**: one model in the fallback chain
//!   failed (timeout, API error, non-JSON reply). The gateway records it and
//!   moves on to the next model; if every model fails, the last error becomes
//!   an `AI Error: …` fraud warning instead of an `Err`.
//!
//! * [`NumericError`]: **Per field**: a single amount, rate or quantity did
//!   not parse. [`crate::pipeline::numeric::normalize_numeric`] replaces it
//!   with the field default.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the edgequake-invoice library.
///
/// Model failures use [`AttemptError`] and are absorbed by the gateway
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is empty or otherwise unusable as a location.
    #[error("Invalid document location '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document was fetched but contained no bytes.
    #[error("Document '{source_name}' is empty")]
    EmptyDocument { source_name: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// A model in the chain could not be constructed (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured for model '{model}'.\n{hint}")]
    ProviderNotConfigured {
        provider: String,
        model: String,
        hint: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of one model attempt inside the gateway.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptError {
    /// The call did not finish within the per-attempt timeout.
    #[error("model '{model}' timed out after {timeout:?}")]
    Timeout { model: String, timeout: Duration },

    /// The provider returned an error (network, auth, refusal, quota …).
    #[error("model '{model}' failed: {detail}")]
    Api { model: String, detail: String },

    /// The provider answered with an empty body.
    #[error("model '{model}' returned an empty response")]
    EmptyResponse { model: String },

    /// The reply was not valid JSON.
    #[error("model '{model}' returned invalid JSON: {detail}")]
    InvalidJson { model: String, detail: String },

    /// The reply was valid JSON but not a JSON object.
    #[error("model '{model}' returned JSON {found} instead of an object")]
    NotAnObject { model: String, found: &'static str },
}

/// Why a single numeric field could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    /// Nothing left after stripping symbols, separators and whitespace.
    #[error("value is empty")]
    Empty,

    /// The cleaned text is not a number.
    #[error("'{0}' is not a number")]
    Unparsable(String),

    /// The value parsed to NaN or infinity.
    #[error("'{0}' is not a finite number")]
    NonFinite(String),
}
