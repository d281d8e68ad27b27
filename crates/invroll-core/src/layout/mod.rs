//! Visual line reconstruction from positioned text tokens.
//!
//! PDFs expose words with coordinates but no row structure. Tokens are
//! clustered by their top coordinate into visual lines, each ordered
//! left-to-right.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A positioned text fragment. `y` grows downward from the top of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Left edge.
    pub x0: f32,
    /// Top edge.
    pub y0: f32,
    /// Right edge.
    pub x1: f32,
    /// Bottom edge.
    pub y1: f32,
    /// Text content.
    pub text: String,
}

impl Token {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32, text: impl Into<String>) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            text: text.into(),
        }
    }
}

/// Tokens judged to lie on one horizontal line, left to right.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualLine {
    pub tokens: Vec<Token>,
}

impl VisualLine {
    /// Token texts in reading order.
    pub fn texts(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    /// Full line text joined with single spaces.
    pub fn text(&self) -> String {
        self.texts().join(" ")
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Group tokens into visual lines.
///
/// Tokens are ordered by (top rounded to 0.1, left); a new line starts when a
/// token's top differs from the first token of the current line by more than
/// `y_tolerance`.
pub fn group_lines(tokens: &[Token], y_tolerance: f32) -> Vec<VisualLine> {
    let mut sorted: Vec<&Token> = tokens.iter().collect();
    sorted.sort_by(|a, b| reading_order(a, b));

    let mut lines = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut reference_y: Option<f32> = None;

    for token in sorted {
        match reference_y {
            Some(y) if (token.y0 - y).abs() > y_tolerance => {
                lines.push(finish_line(std::mem::take(&mut current)));
                reference_y = Some(token.y0);
            }
            Some(_) => {}
            None => reference_y = Some(token.y0),
        }
        current.push(token.clone());
    }

    if !current.is_empty() {
        lines.push(finish_line(current));
    }

    lines
}

fn finish_line(mut tokens: Vec<Token>) -> VisualLine {
    tokens.sort_by(|a, b| {
        a.x0.total_cmp(&b.x0)
            .then_with(|| a.x1.total_cmp(&b.x1))
            .then_with(|| a.y0.total_cmp(&b.y0))
            .then_with(|| a.text.cmp(&b.text))
    });
    VisualLine { tokens }
}

/// Total order over tokens so that grouping does not depend on input order.
fn reading_order(a: &Token, b: &Token) -> Ordering {
    round_tenth(a.y0)
        .total_cmp(&round_tenth(b.y0))
        .then_with(|| a.x0.total_cmp(&b.x0))
        .then_with(|| a.y0.total_cmp(&b.y0))
        .then_with(|| a.x1.total_cmp(&b.x1))
        .then_with(|| a.y1.total_cmp(&b.y1))
        .then_with(|| a.text.cmp(&b.text))
}

fn round_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}
