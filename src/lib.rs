//! # edgequake-invoice
//!
//! Extract line items from scanned invoices with Vision Language Models (VLMs)
//! and check that they add up to the total printed on the document.
//!
//! ## Why this crate?
//!
//! A VLM reads an invoice image far better than template-based OCR, but its
//! output is a best-effort guess: numbers arrive as `"$1,234.50"`, fields go
//! missing, and rows get dropped or invented. This crate wraps the model in a
//! pipeline that normalises its JSON into a strict schema, recomputes the
//! total from the extracted items, and flags any disagreement with the printed
//! total as a possible fraud signal.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document location
//!  │
//!  ├─ 1. Input       download URL or read local file
//!  ├─ 2. Preprocess  sniff format, report labels (no pixels changed)
//!  ├─ 3. Encode      bytes → base64 ImageData
//!  ├─ 4. Gateway     primary model, then fallbacks; failure becomes a warning
//!  ├─ 5. Normalize   loose JSON → pages of line items (every number cleaned)
//!  ├─ 6. Reconcile   recomputed sum vs printed total
//!  └─ 7. Assemble    ExtractionResult wrapped in an Envelope
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_invoice::{extract_document, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini credentials are read from GEMINI_API_KEY.
//!     let config = ExtractionConfig::default();
//!     let envelope = extract_document("invoice.png", &config).await;
//!     let result = envelope.into_result()?;
//!     println!("{} items, sum {:.2}", result.item_count, result.reconciled_amount);
//!     for warning in &result.fraud_warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2json` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ModelSpec};
pub use error::{AttemptError, InvoiceError, NumericError};
pub use extract::{
    extract_batch, extract_document, extract_from_bytes, extract_sync, Extractor,
};
pub use output::{Envelope, ExtractionResult, LineItem, Page};
pub use pipeline::gateway::{LlmVisionModel, ModelGateway, ModelReply, VisionModel};
pub use pipeline::numeric::normalize_numeric;
pub use pipeline::reconcile::{reconcile, DEFAULT_MISMATCH_TOLERANCE};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
