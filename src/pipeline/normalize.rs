//! Extraction normalisation: loosely-typed model JSON → strict line items.
//!
//! The model is asked for a fixed shape (see [`crate::prompts`]) but nothing
//! guarantees it complies. Every lookup here degrades instead of failing:
//! a missing or non-list `pagewise_line_items` is an empty document, a page
//! without `bill_items` is an empty page, and a field of the wrong type falls
//! back to its default. Partial extraction beats no extraction.

use crate::output::{LineItem, Page};
use crate::pipeline::numeric::normalize_numeric;
use crate::prompts::{
    KEY_FRAUD_FLAGS, KEY_INVOICE_TOTAL, KEY_ITEMS, KEY_ITEM_AMOUNT, KEY_ITEM_NAME,
    KEY_ITEM_QUANTITY, KEY_ITEM_RATE, KEY_PAGES, KEY_PAGE_NO,
};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_ITEM_NAME: &str = "Unknown";
pub const DEFAULT_PAGE_NO: &str = "1";
pub const DEFAULT_AMOUNT: f64 = 0.0;
pub const DEFAULT_RATE: f64 = 0.0;
pub const DEFAULT_QUANTITY: f64 = 1.0;

/// Pages plus the figures derived from them while walking the items.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedExtraction {
    pub pages: Vec<Page>,
    pub item_count: usize,
    /// Unrounded sum of every item amount. Always finite: an amount that
    /// would overflow the sum is left out of it.
    pub running_total: f64,
}

/// Walk `pagewise_line_items[*].bill_items[*]` and build strict pages.
///
/// Non-object page or item entries are skipped. Page and item order are
/// preserved exactly as the model returned them.
pub fn normalize(raw: &Value) -> NormalizedExtraction {
    let mut pages = Vec::new();
    let mut item_count = 0usize;
    let mut running_total = 0.0f64;

    for (idx, raw_page) in list_at(raw, KEY_PAGES).iter().enumerate() {
        if !raw_page.is_object() {
            debug!("Skipping page entry {idx}: not an object");
            continue;
        }

        let items: Vec<LineItem> = list_at(raw_page, KEY_ITEMS)
            .iter()
            .filter(|item| item.is_object())
            .map(normalize_item)
            .collect();

        for item in &items {
            let next = running_total + item.amount;
            if next.is_finite() {
                running_total = next;
            } else {
                warn!(
                    "Amount {} of '{}' overflows the running total; left out of the sum",
                    item.amount, item.name
                );
            }
        }
        item_count += items.len();

        pages.push(Page {
            page_number: text_at(raw_page, KEY_PAGE_NO).unwrap_or_else(|| DEFAULT_PAGE_NO.into()),
            items,
        });
    }

    NormalizedExtraction {
        pages,
        item_count,
        running_total,
    }
}

/// Read the model-reported printed total (`invoice_total`), default `0.0`.
pub fn printed_total(raw: &Value) -> f64 {
    raw.get(KEY_INVOICE_TOTAL)
        .map(|v| normalize_numeric(v, 0.0))
        .unwrap_or(0.0)
}

/// Read the model's own `fraud_flags`, stringifying non-string entries.
pub fn model_fraud_flags(raw: &Value) -> Vec<String> {
    list_at(raw, KEY_FRAUD_FLAGS)
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

fn normalize_item(raw: &Value) -> LineItem {
    LineItem {
        name: text_at(raw, KEY_ITEM_NAME).unwrap_or_else(|| DEFAULT_ITEM_NAME.into()),
        amount: number_at(raw, KEY_ITEM_AMOUNT, DEFAULT_AMOUNT),
        rate: number_at(raw, KEY_ITEM_RATE, DEFAULT_RATE),
        quantity: number_at(raw, KEY_ITEM_QUANTITY, DEFAULT_QUANTITY),
    }
}

/// The array under `key`, or an empty slice for anything else.
fn list_at<'a>(raw: &'a Value, key: &str) -> &'a [Value] {
    raw.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn number_at(raw: &Value, key: &str, default: f64) -> f64 {
    raw.get(key)
        .map(|v| normalize_numeric(v, default))
        .unwrap_or(default)
}

/// Strings as-is, numbers and booleans stringified, anything else absent.
fn text_at(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_response() {
        let raw = json!({
            "invoice_total": 150.0,
            "pagewise_line_items": [{
                "page_no": "1",
                "bill_items": [
                    {"item_name": "Consultation", "item_amount": 100.0, "item_rate": 100.0, "item_quantity": 1},
                    {"item_name": "Syringe", "item_amount": "$50.00", "item_rate": "25", "item_quantity": "2"}
                ]
            }],
            "fraud_flags": []
        });
        let n = normalize(&raw);
        assert_eq!(n.item_count, 2);
        assert_eq!(n.running_total, 150.0);
        assert_eq!(n.pages.len(), 1);
        assert_eq!(n.pages[0].page_number, "1");
        assert_eq!(n.pages[0].items[1].name, "Syringe");
        assert_eq!(n.pages[0].items[1].amount, 50.0);
        assert_eq!(n.pages[0].items[1].rate, 25.0);
        assert_eq!(n.pages[0].items[1].quantity, 2.0);
    }

    #[test]
    fn missing_pages_is_empty() {
        let n = normalize(&json!({"invoice_total": 10}));
        assert!(n.pages.is_empty());
        assert_eq!(n.item_count, 0);
        assert_eq!(n.running_total, 0.0);
    }

    #[test]
    fn wrong_typed_pages_is_empty() {
        let n = normalize(&json!({"pagewise_line_items": "none found"}));
        assert!(n.pages.is_empty());
        let n = normalize(&json!(["not", "an", "object"]));
        assert!(n.pages.is_empty());
    }

    #[test]
    fn item_defaults_apply_per_field() {
        let raw = json!({"pagewise_line_items": [{"bill_items": [
            {"item_amount": null, "item_rate": "abc"},
            {"item_name": null, "item_amount": "12", "item_quantity": ""}
        ]}]});
        let n = normalize(&raw);
        let items = &n.pages[0].items;
        assert_eq!(n.pages[0].page_number, DEFAULT_PAGE_NO);
        assert_eq!(
            items[0],
            LineItem {
                name: "Unknown".into(),
                amount: 0.0,
                rate: 0.0,
                quantity: 1.0,
            }
        );
        assert_eq!(items[1].name, "Unknown");
        assert_eq!(items[1].amount, 12.0);
        assert_eq!(items[1].quantity, 1.0);
        assert_eq!(n.running_total, 12.0);
    }

    #[test]
    fn item_count_spans_pages_and_skips_junk_entries() {
        let raw = json!({"pagewise_line_items": [
            {"page_no": 1, "bill_items": [{"item_amount": 1}, {"item_amount": 2}]},
            "garbage",
            {"page_no": "2", "bill_items": [{"item_amount": 3}, 42, null]},
            {"page_no": "3"}
        ]});
        let n = normalize(&raw);
        assert_eq!(n.pages.len(), 3);
        assert_eq!(n.item_count, 3);
        assert_eq!(
            n.item_count,
            n.pages.iter().map(|p| p.items.len()).sum::<usize>()
        );
        assert_eq!(n.pages[0].page_number, "1");
        assert!(n.pages[2].items.is_empty());
        assert_eq!(n.running_total, 6.0);
    }

    #[test]
    fn item_order_is_preserved() {
        let raw = json!({"pagewise_line_items": [{"bill_items": [
            {"item_name": "z", "item_amount": 3},
            {"item_name": "a", "item_amount": 1},
            {"item_name": "m", "item_amount": 2}
        ]}]});
        let names: Vec<_> = normalize(&raw).pages[0]
            .items
            .iter()
            .map(|i| i.name.clone())
            .collect();
        assert_eq!(names, ["z", "a", "m"]);
    }

    #[test]
    fn discount_rows_keep_their_sign() {
        let raw = json!({"pagewise_line_items": [{"bill_items": [
            {"item_name": "Room charges", "item_amount": "2,000.00"},
            {"item_name": "Discount", "item_amount": "-250.00"}
        ]}]});
        let n = normalize(&raw);
        assert_eq!(n.pages[0].items[1].amount, -250.0);
        assert_eq!(n.running_total, 1750.0);
    }

    #[test]
    fn overflowing_amounts_keep_total_finite() {
        let raw = json!({"pagewise_line_items": [{"bill_items": [
            {"item_name": "A", "item_amount": 1e308},
            {"item_name": "B", "item_amount": 1e308},
            {"item_name": "C", "item_amount": 5}
        ]}]});
        let n = normalize(&raw);
        assert_eq!(n.item_count, 3);
        assert!(n.running_total.is_finite());
        assert_eq!(n.running_total, 1e308 + 5.0);
        assert_eq!(n.pages[0].items[1].amount, 1e308);
    }

    #[test]
    fn printed_total_defaults_to_zero() {
        assert_eq!(printed_total(&json!({})), 0.0);
        assert_eq!(printed_total(&json!({"invoice_total": "n/a"})), 0.0);
        assert_eq!(printed_total(&json!({"invoice_total": "1,500.00"})), 1500.0);
    }

    #[test]
    fn fraud_flags_pass_through() {
        let raw = json!({"fraud_flags": ["Overwritten total", 7, null]});
        assert_eq!(model_fraud_flags(&raw), vec!["Overwritten total", "7"]);
        assert!(model_fraud_flags(&json!({"fraud_flags": "yes"})).is_empty());
    }
}
