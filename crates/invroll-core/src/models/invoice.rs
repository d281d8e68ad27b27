//! Invoice, line-item and rollup data models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Decimal places kept on money values in returned and persisted rows.
pub const MONEY_DP: u32 = 2;

/// One purchased product or service entry on an invoice.
///
/// Built through [`LineItem::validated`], which enforces a positive quantity
/// and the quantity × unit price ≈ total cross-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item code, lower-cased.
    pub item_code: String,

    /// Item description (may be empty).
    pub item_name: String,

    /// Quantity, always positive.
    pub quantity: u32,

    /// Price per unit.
    pub unit_price: Decimal,

    /// Extended line total.
    pub line_total: Decimal,
}

impl LineItem {
    /// Build a line item, rejecting it when the quantity is zero or the
    /// arithmetic does not hold within `tolerance_ratio` of the total.
    pub fn validated(
        item_code: impl Into<String>,
        item_name: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
        line_total: Decimal,
        tolerance_ratio: Decimal,
    ) -> Result<Self, ExtractionError> {
        if quantity == 0 {
            return Err(ExtractionError::validation("quantity", "must be positive"));
        }

        if !within_tolerance(quantity, unit_price, line_total, tolerance_ratio)? {
            return Err(ExtractionError::validation(
                "line_total",
                format!("{} x {} does not match {}", quantity, unit_price, line_total),
            ));
        }

        Ok(Self {
            item_code: item_code.into().trim().to_lowercase(),
            item_name: item_name.into(),
            quantity,
            unit_price,
            line_total,
        })
    }
}

/// Check `|quantity * unit_price - line_total| <= ratio * max(|line_total|, 1)`.
///
/// Amounts too large to multiply or subtract are a validation error.
pub fn within_tolerance(
    quantity: u32,
    unit_price: Decimal,
    line_total: Decimal,
    tolerance_ratio: Decimal,
) -> Result<bool, ExtractionError> {
    let out_of_range = || ExtractionError::validation("line_total", "amount out of range");

    let expected = Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(out_of_range)?;
    let band = tolerance_ratio
        .checked_mul(line_total.abs().max(Decimal::ONE))
        .ok_or_else(out_of_range)?;
    let deviation = expected.checked_sub(line_total).ok_or_else(out_of_range)?;
    Ok(deviation.abs() <= band)
}

/// A line item enriched with its invoice and source-file context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLine {
    /// Supplier name (empty when unknown).
    pub supplier: String,

    /// Invoice number the line belongs to.
    pub invoice_number: String,

    /// Invoice date, when one could be inferred.
    pub invoice_date: Option<NaiveDate>,

    /// Item code, lower-cased.
    pub item_code: String,

    /// Item description.
    pub item_name: String,

    /// Quantity.
    pub quantity: u32,

    /// Unit price rounded to cents.
    pub unit_price: Decimal,

    /// Line total rounded to cents.
    pub line_total: Decimal,

    /// Base name of the PDF the line was read from.
    pub file_name: String,
}

impl ParsedLine {
    /// Attach invoice context to an extracted line item.
    pub fn new(item: LineItem, header: &InvoiceHeader, file_name: &str) -> Self {
        Self {
            supplier: header.supplier.clone(),
            invoice_number: header.invoice_number.clone(),
            invoice_date: header.invoice_date,
            item_code: item.item_code,
            item_name: item.item_name,
            quantity: item.quantity,
            unit_price: item.unit_price.round_dp(MONEY_DP),
            line_total: item.line_total.round_dp(MONEY_DP),
            file_name: file_name.to_string(),
        }
    }
}

/// Header fields inferred for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    /// Invoice number (never empty; falls back to the file stem).
    pub invoice_number: String,

    /// Invoice date.
    pub invoice_date: Option<NaiveDate>,

    /// Supplier name (empty when unknown).
    pub supplier: String,
}

/// One row per distinct invoice number in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Supplier name.
    pub supplier: String,

    /// Unique key.
    pub invoice_number: String,

    /// Invoice date.
    pub invoice_date: Option<NaiveDate>,

    /// Sum of line quantities.
    pub total_quantity: u64,

    /// Sum of line totals, rounded to cents.
    pub total_value: Decimal,

    /// Number of accepted line items.
    pub line_count: usize,

    /// Base name of the source PDF.
    pub file_name: String,
}

impl InvoiceRecord {
    /// Summarize the accepted lines of one invoice.
    pub fn from_lines(header: &InvoiceHeader, file_name: &str, lines: &[ParsedLine]) -> Self {
        let total_quantity = lines.iter().map(|l| u64::from(l.quantity)).sum();
        let total_value = lines
            .iter()
            .fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.line_total));

        Self {
            supplier: header.supplier.clone(),
            invoice_number: header.invoice_number.clone(),
            invoice_date: header.invoice_date,
            total_quantity,
            total_value: total_value.round_dp(MONEY_DP),
            line_count: lines.len(),
            file_name: file_name.to_string(),
        }
    }
}

/// Lifetime statistics for one item code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRollup {
    /// Item code.
    pub item_code: String,

    /// Most frequently seen description for the code.
    pub item_name: String,

    /// Number of distinct invoices referencing the code.
    pub invoice_count: usize,

    /// Invoices per month over the observed date span.
    pub frequency_per_month: Decimal,

    /// Total quantity.
    pub total_quantity: u64,

    /// Total value.
    pub total_value: Decimal,

    /// Average unit price (value / quantity, 0 when no quantity).
    pub avg_price: Decimal,

    /// Latest invoice date seen for the code.
    pub last_invoice_date: Option<NaiveDate>,
}

/// Totals for one calendar month with month-over-month change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRollup {
    /// Month as `YYYY-MM`.
    pub month: String,

    /// Total quantity.
    pub total_quantity: u64,

    /// Total value, rounded to cents.
    pub total_value: Decimal,

    /// Quantity change versus the previous month as a fraction.
    pub qty_month_over_month_pct: Option<Decimal>,

    /// Value change versus the previous month as a fraction.
    pub val_month_over_month_pct: Option<Decimal>,
}

/// Output of one ingest call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Every accepted line item with its invoice context.
    pub parsed_lines: Vec<ParsedLine>,

    /// One record per distinct invoice number.
    pub invoices: Vec<InvoiceRecord>,

    /// Per-item rollups, highest value first.
    pub master: Vec<ItemRollup>,

    /// Per-month rollups, oldest first.
    pub monthly: Vec<MonthlyRollup>,

    /// Number of PDF entries encountered across all archives.
    pub files_processed: usize,

    /// Human-readable per-archive / per-document failures.
    pub errors: Vec<String>,

    /// PDF entries skipped because their invoice number was already seen.
    pub duplicates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_exact_product_is_accepted() {
        let item = LineItem::validated("A100", "Widget", 5, dec("10.00"), dec("50.00"), dec("0.25"))
            .unwrap();
        assert_eq!(item.item_code, "a100");
        assert_eq!(item.quantity, 5);
    }

    #[test]
    fn test_tolerance_band_edges() {
        let within = |q, unit, total| within_tolerance(q, dec(unit), dec(total), dec("0.25")).unwrap();
        // 4 x 10.00 = 40.00, band = 0.25 * 50.00 = 12.50
        assert!(within(4, "10.00", "50.00"));
        // 2 x 10.00 = 20.00, off by 30.00 > 12.50
        assert!(!within(2, "10.00", "50.00"));
        // small totals use a band of at least 0.25
        assert!(within(1, "0.20", "0.00"));
        assert!(!within(1, "0.30", "0.00"));
    }

    #[test]
    fn test_tolerance_band_is_inclusive() {
        let within = |q, unit, total| within_tolerance(q, dec(unit), dec(total), dec("0.25")).unwrap();
        assert!(within(1, "0.25", "0.00"));
        assert!(!within(1, "0.26", "0.00"));
        // 1 x 37.50 vs 50.00: off by exactly 12.50
        assert!(within(1, "37.50", "50.00"));
        assert!(!within(1, "37.49", "50.00"));
    }

    #[test]
    fn test_huge_amounts_are_rejected_not_panicking() {
        let huge = dec("1000000000000000000000000.00");
        let err = LineItem::validated("A1", "", 99999, huge, huge, dec("0.25"));
        assert!(matches!(err, Err(ExtractionError::Validation { .. })));
    }

    #[test]
    fn test_inconsistent_total_is_rejected() {
        let err = LineItem::validated("A100", "", 5, dec("10.00"), dec("200.00"), dec("0.25"));
        assert!(matches!(err, Err(ExtractionError::Validation { .. })));
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let err = LineItem::validated("A100", "", 0, dec("10.00"), dec("0.00"), dec("0.25"));
        assert!(err.is_err());
    }

    #[test]
    fn test_negative_lines_use_absolute_band() {
        // credit line: 2 x -5.00 = -10.00
        assert!(within_tolerance(2, dec("-5.00"), dec("-10.00"), dec("0.25")).unwrap());
    }

    #[test]
    fn test_invoice_record_totals() {
        let header = InvoiceHeader {
            invoice_number: "123456-01".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            supplier: "Noble".to_string(),
        };
        let lines = vec![
            ParsedLine::new(
                LineItem::validated("a", "", 2, dec("1.50"), dec("3.00"), dec("0.25")).unwrap(),
                &header,
                "inv.pdf",
            ),
            ParsedLine::new(
                LineItem::validated("b", "", 3, dec("2.00"), dec("6.00"), dec("0.25")).unwrap(),
                &header,
                "inv.pdf",
            ),
        ];

        let record = InvoiceRecord::from_lines(&header, "inv.pdf", &lines);
        assert_eq!(record.total_quantity, 5);
        assert_eq!(record.total_value, dec("9.00"));
        assert_eq!(record.line_count, 2);
    }
}
