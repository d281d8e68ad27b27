//! Normalization delegate contract and response parsing.
//!
//! A delegate maps an invoice excerpt of arbitrary layout onto the fixed
//! line-item schema by calling an external reasoning service. Delegates never
//! fail: every problem is folded into an empty result carrying an error.

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::models::invoice::LineItem;

use super::rules::{parse_money, parse_quantity};

/// Structured invoice returned by a normalization delegate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedInvoice {
    #[serde(deserialize_with = "lenient_string")]
    pub invoice_number: Option<String>,

    #[serde(deserialize_with = "lenient_string")]
    pub invoice_date: Option<String>,

    #[serde(deserialize_with = "lenient_string")]
    pub supplier: Option<String>,

    #[serde(deserialize_with = "lenient_lines")]
    pub lines: Vec<NormalizedLine>,

    /// Why the result is empty, when the call or the decoding failed.
    #[serde(skip_deserializing)]
    pub error: Option<String>,
}

/// One line as returned by the delegate, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedLine {
    #[serde(deserialize_with = "lenient_string")]
    pub item_code: Option<String>,

    #[serde(deserialize_with = "lenient_string")]
    pub item_name: Option<String>,

    #[serde(deserialize_with = "lenient_quantity")]
    pub quantity: Option<u32>,

    #[serde(deserialize_with = "lenient_decimal")]
    pub unit_price: Option<Decimal>,

    #[serde(deserialize_with = "lenient_decimal")]
    pub line_total: Option<Decimal>,
}

impl NormalizedInvoice {
    /// Empty result tagged with an error description.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Lines that pass the same validation as heuristic lines.
    pub fn line_items(&self, tolerance_ratio: Decimal) -> Vec<LineItem> {
        self.lines
            .iter()
            .filter_map(|line| {
                let code = line.item_code.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
                let item = LineItem::validated(
                    code,
                    line.item_name.as_deref().unwrap_or("").trim(),
                    line.quantity?,
                    line.unit_price?,
                    line.line_total?,
                    tolerance_ratio,
                );
                match item {
                    Ok(item) => Some(item),
                    Err(e) => {
                        trace!("delegate line {} rejected: {}", code, e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Merge per-page results: the first non-empty header field wins, lines
    /// are concatenated in page order, errors are joined.
    pub fn merge_pages(pages: Vec<NormalizedInvoice>) -> NormalizedInvoice {
        let mut merged = NormalizedInvoice::default();
        let mut errors = Vec::new();

        for page in pages {
            fill(&mut merged.invoice_number, page.invoice_number);
            fill(&mut merged.invoice_date, page.invoice_date);
            fill(&mut merged.supplier, page.supplier);
            merged.lines.extend(page.lines);
            if let Some(e) = page.error {
                errors.push(e);
            }
        }

        if !errors.is_empty() {
            merged.error = Some(errors.join("; "));
        }
        merged
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    let empty = slot.as_deref().is_none_or(|s| s.trim().is_empty());
    if empty && value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        *slot = value;
    }
}

/// External reasoning service that normalizes invoice excerpts.
#[async_trait]
pub trait Normalizer: Send + Sync {
    /// Normalize one excerpt. Must not fail; failures are reported through
    /// [`NormalizedInvoice::error`].
    async fn normalize(&self, excerpt: &str, file_name: &str) -> NormalizedInvoice;
}

/// Decode a reasoning-service reply, tolerating commentary around the JSON.
pub fn parse_normalization(content: &str) -> NormalizedInvoice {
    let json = match extract_json_object(content) {
        Some(json) => json,
        None => return NormalizedInvoice::failed("no JSON object in response"),
    };

    match serde_json::from_str::<NormalizedInvoice>(json) {
        Ok(invoice) => invoice,
        Err(e) => NormalizedInvoice::failed(format!("malformed JSON in response: {e}")),
    }
}

/// Substring from the first `{` to the last `}`.
pub fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_decimal<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Decimal>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => {
            let s = n.to_string();
            Decimal::from_str(&s).or_else(|_| Decimal::from_scientific(&s)).ok()
        }
        Some(Value::String(s)) => parse_money(&s).ok(),
        _ => None,
    })
}

fn lenient_quantity<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|q| u32::try_from(q).ok()),
        Some(Value::String(s)) => parse_quantity(&s).ok(),
        _ => None,
    })
}

fn lenient_lines<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NormalizedLine>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
