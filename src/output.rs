//! Output types: line items, pages, the assembled result and its envelope.
//!
//! Field names on the wire follow the public response contract
//! (`item_name`, `pagewise_line_items`, `is_success`, …); the Rust names are
//! shorter. Every value here is built once per request and never mutated
//! after [`crate::pipeline::assemble`] hands it out.

use serde::{Deserialize, Serialize};

/// One row of the invoice item table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "item_name")]
    pub name: String,
    /// Always finite; missing or unreadable amounts become `0.0`.
    ///
    /// The sign is kept as printed: discount and credit rows come through
    /// negative rather than being clamped to zero.
    #[serde(rename = "item_amount")]
    pub amount: f64,
    #[serde(rename = "item_rate")]
    pub rate: f64,
    #[serde(rename = "item_quantity")]
    pub quantity: f64,
}

/// One page worth of items, in model output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "page_no")]
    pub page_number: String,
    #[serde(rename = "bill_items")]
    pub items: Vec<LineItem>,
}

/// The reconciled extraction for one document.
///
/// `item_count` and `reconciled_amount` are always derived from `pages`,
/// never copied from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(rename = "pagewise_line_items")]
    pub pages: Vec<Page>,
    #[serde(rename = "total_item_count")]
    pub item_count: usize,
    pub reconciled_amount: f64,
    #[serde(rename = "printed_bill_total")]
    pub printed_total: f64,
    pub fraud_warnings: Vec<String>,
    #[serde(rename = "preprocessing_applied")]
    pub preprocessing_labels: Vec<String>,
}

/// Uniform success/failure wrapper returned for every document.
///
/// `data` is populated exactly when `success` is true; `error` exactly when
/// it is false. Construct through [`Envelope::success`] and
/// [`Envelope::failure`] to keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "is_success")]
    pub success: bool,
    pub data: Option<ExtractionResult>,
    pub error: Option<String>,
}

impl Envelope {
    pub fn success(data: ExtractionResult) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Convert into a `Result`, for callers that prefer `?` over flags.
    pub fn into_result(self) -> Result<ExtractionResult, String> {
        let success = self.success;
        match (self.data, self.error) {
            (Some(data), _) if success => Ok(data),
            (_, Some(err)) => Err(err),
            _ => Err("envelope carries neither data nor error".to_string()),
        }
    }
}
