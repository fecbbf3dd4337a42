//! Extraction instructions sent with every invoice image.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the JSON shape the model is asked for must
//!    stay in sync with what [`crate::pipeline::normalize`] reads. Keeping it
//!    next to the field-name constants makes drift obvious.
//!
//! 2. **Testability**: unit tests can inspect the prompt directly without
//!    calling a real VLM.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Top-level key holding the list of pages.
pub const KEY_PAGES: &str = "pagewise_line_items";
/// Per-page key holding the list of items.
pub const KEY_ITEMS: &str = "bill_items";
/// Per-page key holding the page label.
pub const KEY_PAGE_NO: &str = "page_no";
/// Per-item keys.
pub const KEY_ITEM_NAME: &str = "item_name";
pub const KEY_ITEM_AMOUNT: &str = "item_amount";
pub const KEY_ITEM_RATE: &str = "item_rate";
pub const KEY_ITEM_QUANTITY: &str = "item_quantity";
/// Top-level key holding the printed grand total.
pub const KEY_INVOICE_TOTAL: &str = "invoice_total";
/// Top-level key holding model-reported fraud flags.
pub const KEY_FRAUD_FLAGS: &str = "fraud_flags";

/// Default extraction instruction for a single invoice image.
///
/// This prompt is used when `ExtractionConfig::system_prompt` is `None`.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an automated data extraction system. Analyze this invoice image.

TASK 1: Extract ALL line items from the main table.
TASK 2: Extract the final "Grand Total" or "Net Payable" printed on the document.

CRITICAL RULES:
1. Output MUST be valid JSON. Output ONLY the JSON object, no commentary.
2. Extract every single row in the item table. Do NOT stop after a few items.
3. Ignore 'Category Total', 'Subtotal', 'Tax', 'VAT' rows; they are not line items.
4. Put ALL items into the 'bill_items' list of a SINGLE page object, even if the
   document spans several pages.

REQUIRED JSON STRUCTURE:
{
  "invoice_total": 1500.00,
  "pagewise_line_items": [
    {
      "page_no": "1",
      "bill_items": [
        { "item_name": "Item Name", "item_amount": 100.00, "item_rate": 10.00, "item_quantity": 10 }
      ]
    }
  ],
  "fraud_flags": []
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_field_the_normalizer_reads() {
        for key in [
            KEY_PAGES,
            KEY_ITEMS,
            KEY_PAGE_NO,
            KEY_ITEM_NAME,
            KEY_ITEM_AMOUNT,
            KEY_ITEM_RATE,
            KEY_ITEM_QUANTITY,
            KEY_INVOICE_TOTAL,
            KEY_FRAUD_FLAGS,
        ] {
            assert!(
                DEFAULT_EXTRACTION_PROMPT.contains(key),
                "prompt is missing '{key}'"
            );
        }
    }

    #[test]
    fn prompt_excludes_subtotal_rows() {
        assert!(DEFAULT_EXTRACTION_PROMPT.contains("Subtotal"));
        assert!(DEFAULT_EXTRACTION_PROMPT.contains("SINGLE page object"));
    }
}
