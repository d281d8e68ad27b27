//! Heuristic line-item extraction from visual lines.
//!
//! Numeric columns are anchored on the rightmost amount (line total) and
//! scanned inward: the nearest amount to its left is the unit price and the
//! nearest short integer left of that is the quantity. The code is the
//! leading token, skipping a sequence number.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::trace;

use crate::error::ExtractionError;
use crate::layout::{Token, VisualLine};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::LineItem;

use super::rules::{is_money, is_quantity, parse_money, parse_quantity, ITEM_CODE};

/// Why a visual line did not produce a line item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("no amount tokens")]
    NoAmounts,

    #[error("no unit price left of the total")]
    NoUnitPrice,

    #[error("no quantity left of the unit price")]
    NoQuantity,

    #[error("leading token {0:?} is not an item code")]
    BadCode(String),

    #[error(transparent)]
    Invalid(#[from] ExtractionError),
}

/// Extracts validated line items from the visual lines of a page.
#[derive(Debug, Clone)]
pub struct LineItemExtractor {
    tolerance_ratio: Decimal,
    max_quantity_digits: usize,
}

impl LineItemExtractor {
    /// Create an extractor with default tolerances.
    pub fn new() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }

    /// Create an extractor from configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            tolerance_ratio: config.tolerance(),
            max_quantity_digits: config.max_quantity_digits,
        }
    }

    /// Set the cross-validation tolerance ratio.
    pub fn with_tolerance_ratio(mut self, ratio: Decimal) -> Self {
        self.tolerance_ratio = ratio;
        self
    }

    /// Set the maximum digits of a quantity token.
    pub fn with_max_quantity_digits(mut self, digits: usize) -> Self {
        self.max_quantity_digits = digits;
        self
    }

    /// Extract every line item on a page.
    pub fn extract(&self, lines: &[VisualLine]) -> Vec<LineItem> {
        lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| match self.parse_line(line, lines.get(i + 1)) {
                Ok(item) => Some(item),
                Err(reason) => {
                    trace!("line {} rejected ({}): {}", i, reason, line.text());
                    None
                }
            })
            .collect()
    }

    /// Parse one visual line; `next` is the following line on the page, a
    /// candidate wrapped description row.
    pub fn parse_line(
        &self,
        line: &VisualLine,
        next: Option<&VisualLine>,
    ) -> Result<LineItem, Rejection> {
        let tokens = &line.tokens;

        let total_i = tokens
            .iter()
            .rposition(|t| is_money(&t.text))
            .ok_or(Rejection::NoAmounts)?;
        let unit_i = tokens[..total_i]
            .iter()
            .rposition(|t| is_money(&t.text))
            .ok_or(Rejection::NoUnitPrice)?;
        let qty_i = tokens[..unit_i]
            .iter()
            .rposition(|t| is_quantity(&t.text, self.max_quantity_digits))
            .ok_or(Rejection::NoQuantity)?;

        let code_i = if tokens.len() > 1 && is_quantity(&tokens[0].text, self.max_quantity_digits)
        {
            1
        } else {
            0
        };
        let code = tokens[code_i].text.trim();
        if !ITEM_CODE.is_match(code) {
            return Err(Rejection::BadCode(code.to_string()));
        }

        let mut item_name = next
            .filter(|n| !n.tokens.iter().any(|t| is_money(&t.text)))
            .map(|n| trim_description(&n.text()))
            .unwrap_or_default();
        if item_name.is_empty() {
            item_name = description_between(tokens, code_i, qty_i);
        }

        let quantity = parse_quantity(&tokens[qty_i].text)?;
        let unit_price = parse_money(&tokens[unit_i].text)?;
        let line_total = parse_money(&tokens[total_i].text)?;

        Ok(LineItem::validated(
            code,
            item_name,
            quantity,
            unit_price,
            line_total,
            self.tolerance_ratio,
        )?)
    }
}

impl Default for LineItemExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokens horizontally between the code and quantity columns.
fn description_between(tokens: &[Token], code_i: usize, qty_i: usize) -> String {
    let left = tokens[code_i].x1 - 1.0;
    let right = tokens[qty_i].x0 + 1.0;

    let words: Vec<&str> = tokens
        .iter()
        .enumerate()
        .filter(|(j, t)| *j != code_i && *j != qty_i && t.x0 >= left && t.x1 <= right)
        .map(|(_, t)| t.text.as_str())
        .collect();

    trim_description(&words.join(" "))
}

fn trim_description(s: &str) -> String {
    s.trim_matches(|c: char| c == ' ' || c == '-' || c == '/')
        .to_string()
}
