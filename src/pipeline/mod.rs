//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ encode ──▶ gateway ──▶ normalize ──▶ reconcile ──▶ assemble
//! (URL/path)  (sniff)      (base64)   (VLM chain)  (+ numeric)   (totals)     (envelope)
//! ```
//!
//! 1. [`input`]: fetch the document bytes from a URL or local path
//! 2. [`preprocess`]: sniff the image format and report preprocessing labels
//! 3. [`encode`]: base64-wrap the bytes for the multimodal request
//! 4. [`gateway`]: ordered model chain with per-attempt timeout; the only
//!    stage that talks to a model, and it never fails
//! 5. [`normalize`]: loosely-typed JSON → strict pages, every number going
//!    through [`numeric`]
//! 6. [`reconcile`]: compare the recomputed sum with the printed total
//! 7. [`assemble`]: derived counts and the outward-facing envelope

pub mod assemble;
pub mod encode;
pub mod gateway;
pub mod input;
pub mod normalize;
pub mod numeric;
pub mod preprocess;
pub mod reconcile;
