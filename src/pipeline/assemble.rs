//! Response assembly: normalised pages + reconciliation → [`Envelope`].
//!
//! This is where the derived figures are fixed: `item_count` comes from the
//! normalised pages and `reconciled_amount` is their sum rounded to cents.
//! Whatever the model claimed about either is ignored.

use crate::error::InvoiceError;
use crate::output::{Envelope, ExtractionResult};
use crate::pipeline::normalize::{self, NormalizedExtraction};
use crate::pipeline::numeric::round_cents;
use crate::pipeline::reconcile::reconcile;
use serde_json::Value;

/// Package normalised pages and reconciliation output.
pub fn assemble(
    normalized: NormalizedExtraction,
    printed_total: f64,
    fraud_warnings: Vec<String>,
    preprocessing_labels: Vec<String>,
) -> ExtractionResult {
    ExtractionResult {
        item_count: normalized.item_count,
        reconciled_amount: round_cents(normalized.running_total),
        pages: normalized.pages,
        printed_total,
        fraud_warnings,
        preprocessing_labels,
    }
}

/// Run normalisation and reconciliation over a raw model response.
///
/// Pure and infallible: any JSON value produces a result.
pub fn assemble_from_raw(
    raw: &Value,
    preprocessing_labels: Vec<String>,
    mismatch_tolerance: f64,
) -> ExtractionResult {
    let normalized = normalize::normalize(raw);
    let printed = normalize::printed_total(raw);
    let warnings = reconcile(
        normalized.running_total,
        printed,
        normalize::model_fraud_flags(raw),
        mismatch_tolerance,
    );
    assemble(normalized, printed, warnings, preprocessing_labels)
}

/// Map a pipeline outcome to the outward-facing envelope.
pub fn into_envelope(outcome: Result<ExtractionResult, InvoiceError>) -> Envelope {
    match outcome {
        Ok(result) => Envelope::success(result),
        Err(e) => Envelope::failure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::reconcile::DEFAULT_MISMATCH_TOLERANCE;
    use serde_json::json;

    #[test]
    fn derived_fields_ignore_model_claims() {
        let raw = json!({
            "total_item_count": 99,
            "reconciled_amount": 12345.0,
            "invoice_total": 30.0,
            "pagewise_line_items": [{"page_no": "1", "bill_items": [
                {"item_name": "A", "item_amount": 10.004},
                {"item_name": "B", "item_amount": "20.00"}
            ]}]
        });
        let r = assemble_from_raw(&raw, vec![], DEFAULT_MISMATCH_TOLERANCE);
        assert_eq!(r.item_count, 2);
        assert_eq!(r.reconciled_amount, 30.0);
        assert_eq!(r.printed_total, 30.0);
        assert!(r.fraud_warnings.is_empty());
    }

    #[test]
    fn mismatch_is_appended_after_model_flags() {
        let raw = json!({
            "invoice_total": "1,200.00",
            "fraud_flags": ["Total overwritten by hand"],
            "pagewise_line_items": [{"bill_items": [{"item_amount": "1,000.00"}]}]
        });
        let r = assemble_from_raw(&raw, vec!["Grayscale".into()], DEFAULT_MISMATCH_TOLERANCE);
        assert_eq!(r.fraud_warnings.len(), 2);
        assert_eq!(r.fraud_warnings[0], "Total overwritten by hand");
        assert!(r.fraud_warnings[1].contains("1000.00"));
        assert!(r.fraud_warnings[1].contains("1200.00"));
        assert_eq!(r.preprocessing_labels, vec!["Grayscale"]);
    }

    #[test]
    fn empty_response_is_empty_result() {
        let r = assemble_from_raw(&json!({}), vec![], DEFAULT_MISMATCH_TOLERANCE);
        assert!(r.pages.is_empty());
        assert_eq!(r.item_count, 0);
        assert_eq!(r.reconciled_amount, 0.0);
        assert_eq!(r.printed_total, 0.0);
    }

    #[test]
    fn huge_amounts_stay_numbers_on_the_wire() {
        let raw = json!({
            "invoice_total": 1e307,
            "pagewise_line_items": [{"bill_items": [
                {"item_amount": 1e307},
                {"item_amount": 1.7e308},
                {"item_amount": 1.7e308}
            ]}]
        });
        let r = assemble_from_raw(&raw, vec![], DEFAULT_MISMATCH_TOLERANCE);
        assert!(r.reconciled_amount.is_finite());
        let wire = serde_json::to_value(&r).unwrap();
        assert!(wire["reconciled_amount"].is_number(), "got: {wire}");
        for warning in &r.fraud_warnings {
            assert!(!warning.contains("inf"), "got: {warning}");
        }
    }

    #[test]
    fn errors_become_failure_envelopes() {
        let env = into_envelope(Err(InvoiceError::DownloadFailed {
            url: "https://x/bill.png".into(),
            reason: "HTTP 500".into(),
        }));
        assert!(!env.success);
        assert!(env.data.is_none());
        assert!(env.error.unwrap().contains("HTTP 500"));
    }
}
