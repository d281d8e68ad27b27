//! Supplier name inference.

use regex::Regex;

use crate::error::InvrollError;

/// Shortest text line accepted as a guessed supplier name.
const MIN_GUESS_LEN: usize = 4;

/// Matches configured supplier names, optionally guessing from the text.
#[derive(Debug, Clone)]
pub struct SupplierMatcher {
    known: Vec<(String, Regex)>,
    guess_from_text: bool,
}

impl SupplierMatcher {
    /// Build a matcher for whole-word, case-insensitive supplier names.
    pub fn new(known: &[String], guess_from_text: bool) -> Result<Self, InvrollError> {
        let known = known
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(name.trim()));
                Regex::new(&pattern)
                    .map(|re| (name.trim().to_string(), re))
                    .map_err(|e| InvrollError::Config(format!("supplier {name:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            known,
            guess_from_text,
        })
    }

    /// Infer the supplier, or an empty string.
    pub fn infer(&self, text: &str) -> String {
        if let Some((name, _)) = self.known.iter().find(|(_, re)| re.is_match(text)) {
            return name.clone();
        }

        if self.guess_from_text {
            return guess_from_first_line(text).unwrap_or_default();
        }

        String::new()
    }
}

/// First non-empty text line long enough to plausibly be a company name.
pub fn guess_from_first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| line.chars().count() >= MIN_GUESS_LEN)
        .map(str::to_string)
}
