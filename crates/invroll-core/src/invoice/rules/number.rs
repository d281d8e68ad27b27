//! Invoice number inference.

use std::path::Path;

use super::patterns::{INVOICE_NUMBER_DASHED, INVOICE_NUMBER_LABELED};

/// Infer the invoice number: a `######-##` number, then an `INVOICE #` label,
/// then the file's base name without extension.
pub fn infer_invoice_number(text: &str, file_name: &str) -> String {
    if let Some(caps) = INVOICE_NUMBER_DASHED.captures(text) {
        return caps[1].to_string();
    }

    if let Some(caps) = INVOICE_NUMBER_LABELED.captures(text) {
        return caps[1].to_string();
    }

    file_stem(file_name)
}

/// Base name of an archive entry without directories or extension.
pub fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}

/// Base name of an archive entry without directories.
pub fn base_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string()
}
