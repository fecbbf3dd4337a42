//! Reconciliation: compare the recomputed sum with the printed total.
//!
//! The model reads both the item table and the grand total off the same
//! image. If the items it returned do not add up to the total it read, either
//! the extraction dropped or invented rows, or the document itself does not
//! add up. Both deserve a human look, so the mismatch becomes a fraud warning
//! rather than an error.
//!
//! A printed total of `0` means the model found no total; no comparison is
//! made in that case.

use crate::pipeline::numeric::round_cents;
use tracing::warn;

/// Absolute difference tolerated before a mismatch is reported.
pub const DEFAULT_MISMATCH_TOLERANCE: f64 = 1.0;

/// Append a mismatch warning to `warnings` when the totals disagree.
///
/// Flags already present (typically the model's own `fraud_flags`) are kept
/// in order; at most one warning is added.
pub fn reconcile(
    calculated_total: f64,
    printed_total: f64,
    mut warnings: Vec<String>,
    tolerance: f64,
) -> Vec<String> {
    let diff = (calculated_total - printed_total).abs();
    if diff > tolerance && printed_total > 0.0 {
        warn!(
            "Totals disagree: extracted {:.2} vs printed {:.2} (tolerance {})",
            calculated_total, printed_total, tolerance
        );
        warnings.push(mismatch_warning(calculated_total, printed_total));
    }
    warnings
}

/// Render the warning text for a sum/total mismatch.
pub fn mismatch_warning(calculated_total: f64, printed_total: f64) -> String {
    format!(
        "Mathematical Check Failed: AI Extracted Sum ({:.2}) != Bill Total ({:.2})",
        round_cents(calculated_total),
        round_cents(printed_total)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_tolerance_adds_nothing() {
        let w = reconcile(1000.00, 1000.50, vec![], DEFAULT_MISMATCH_TOLERANCE);
        assert!(w.is_empty());
        let w = reconcile(1000.00, 1001.00, vec![], DEFAULT_MISMATCH_TOLERANCE);
        assert!(w.is_empty(), "a diff of exactly the tolerance is accepted");
    }

    #[test]
    fn mismatch_adds_one_warning_with_both_values() {
        let w = reconcile(1000.00, 1200.00, vec![], DEFAULT_MISMATCH_TOLERANCE);
        assert_eq!(w.len(), 1);
        assert!(w[0].contains("1000.00"), "got: {}", w[0]);
        assert!(w[0].contains("1200.00"), "got: {}", w[0]);
        assert!(w[0].starts_with("Mathematical Check Failed"));
    }

    #[test]
    fn zero_printed_total_never_warns() {
        for calc in [0.0, 1.0, 5000.0, -20.0] {
            assert!(reconcile(calc, 0.0, vec![], DEFAULT_MISMATCH_TOLERANCE).is_empty());
        }
    }

    #[test]
    fn existing_flags_are_kept_first() {
        let w = reconcile(
            10.0,
            99.0,
            vec!["Handwritten correction".into()],
            DEFAULT_MISMATCH_TOLERANCE,
        );
        assert_eq!(w.len(), 2);
        assert_eq!(w[0], "Handwritten correction");
        assert!(w[1].contains("10.00") && w[1].contains("99.00"));
    }

    #[test]
    fn tolerance_is_configurable() {
        assert!(reconcile(100.0, 104.0, vec![], 5.0).is_empty());
        assert_eq!(reconcile(100.0, 100.02, vec![], 0.01).len(), 1);
    }

    #[test]
    fn warning_rounds_to_cents() {
        let msg = mismatch_warning(12.3456, 99.999);
        assert_eq!(
            msg,
            "Mathematical Check Failed: AI Extracted Sum (12.35) != Bill Total (100.00)"
        );
    }
}
