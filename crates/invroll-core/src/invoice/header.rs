//! Invoice header inference from document text and file name.

use crate::error::InvrollError;
use crate::models::config::ExtractionConfig;
use crate::models::invoice::InvoiceHeader;

use super::delegate::NormalizedInvoice;
use super::rules::{infer_invoice_date, infer_invoice_number, normalize_date, SupplierMatcher};

/// Derives invoice number, date and supplier with ordered fallback rules.
#[derive(Debug, Clone)]
pub struct HeaderInference {
    suppliers: SupplierMatcher,
}

impl HeaderInference {
    /// Create header inference from configuration.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, InvrollError> {
        Ok(Self {
            suppliers: SupplierMatcher::new(
                &config.known_suppliers,
                config.guess_supplier_from_text,
            )?,
        })
    }

    /// Infer all header fields. Never fails; unknown fields are left empty,
    /// and the invoice number falls back to the file stem.
    pub fn infer(&self, text: &str, file_name: &str) -> InvoiceHeader {
        InvoiceHeader {
            invoice_number: infer_invoice_number(text, file_name),
            invoice_date: infer_invoice_date(text, file_name),
            supplier: self.suppliers.infer(text),
        }
    }

    /// Merge header fields returned by the reasoning service, falling back to
    /// the text rules for each field it left empty.
    pub fn merge(&self, normalized: &NormalizedInvoice, text: &str, file_name: &str) -> InvoiceHeader {
        let invoice_number = non_empty(normalized.invoice_number.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| infer_invoice_number(text, file_name));

        let invoice_date = non_empty(normalized.invoice_date.as_deref())
            .and_then(normalize_date)
            .or_else(|| infer_invoice_date(text, file_name));

        let supplier = non_empty(normalized.supplier.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| self.suppliers.infer(text));

        InvoiceHeader {
            invoice_number,
            invoice_date,
            supplier,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
