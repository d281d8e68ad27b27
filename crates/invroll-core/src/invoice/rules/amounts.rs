//! Money and quantity token parsing.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::MONEY_TOKEN;
use crate::error::ExtractionError;

/// Check whether a token looks like a currency amount.
pub fn is_money(token: &str) -> bool {
    MONEY_TOKEN.is_match(token)
}

/// Check whether a token is a bare integer of at most `max_digits` digits.
pub fn is_quantity(token: &str, max_digits: usize) -> bool {
    !token.is_empty() && token.len() <= max_digits && token.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a currency amount such as `$1,234.56` or `12.00-` (negative).
pub fn parse_money(token: &str) -> Result<Decimal, ExtractionError> {
    let cleaned: String = token
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();

    let (digits, negative) = match cleaned.strip_suffix('-') {
        Some(rest) => (rest, true),
        None => (cleaned.as_str(), false),
    };

    let value = Decimal::from_str(digits).map_err(|_| ExtractionError::parse("amount", token))?;
    Ok(if negative { -value } else { value })
}

/// Parse a quantity token into a positive integer.
pub fn parse_quantity(token: &str) -> Result<u32, ExtractionError> {
    let cleaned = token.trim().replace(',', "");
    let quantity: u32 = cleaned
        .parse()
        .map_err(|_| ExtractionError::parse("quantity", token))?;

    if quantity == 0 {
        return Err(ExtractionError::validation("quantity", "must be positive"));
    }
    Ok(quantity)
}
