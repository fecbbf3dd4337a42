//! Currency normalisation: turn whatever the model wrote into an `f64`.
//!
//! Models are inconsistent about numbers. The same invoice can come back as
//! `1234.5`, `"1,234.50"`, `"$ 1 234.50"` or `"₹1,234.50 "` depending on the
//! model, the prompt, and the phase of the moon. Every amount, rate, quantity
//! and printed total passes through [`normalize_numeric`], so the rest of the
//! pipeline only ever sees finite numbers.
//!
//! [`parse_numeric`] exposes the failure reason for callers that want it;
//! [`normalize_numeric`] folds every failure into the supplied default.

use crate::error::NumericError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Whitespace, thousands separators and any Unicode currency symbol.
static RE_NUMERIC_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,\p{Sc}]").unwrap());

/// Parse a loosely-typed JSON value as a finite number.
///
/// Strings are cleaned first: whitespace, commas and currency symbols are
/// removed before parsing.
pub fn parse_numeric(raw: &Value) -> Result<f64, NumericError> {
    match raw {
        Value::Null => Err(NumericError::Empty),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(NumericError::NonFinite(n.to_string())),
        },
        Value::String(s) => parse_numeric_str(s),
        other => Err(NumericError::Unparsable(other.to_string())),
    }
}

/// Parse a numeric-looking string, see [`parse_numeric`].
pub fn parse_numeric_str(raw: &str) -> Result<f64, NumericError> {
    let cleaned = RE_NUMERIC_NOISE.replace_all(raw, "");
    if cleaned.is_empty() {
        return Err(NumericError::Empty);
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(NumericError::NonFinite(cleaned.into_owned())),
        Err(_) => Err(NumericError::Unparsable(cleaned.into_owned())),
    }
}

/// Coerce `raw` to a number, returning `default` on any failure.
///
/// Never panics and never returns NaN or infinity (as long as `default`
/// is itself finite).
pub fn normalize_numeric(raw: &Value, default: f64) -> f64 {
    parse_numeric(raw).unwrap_or(default)
}

/// Round to two decimal places (cents).
///
/// Values too large to scale by 100 have no fractional cents to round and
/// are returned unchanged.
pub fn round_cents(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}
