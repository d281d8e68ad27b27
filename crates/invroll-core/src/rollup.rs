//! Per-item and per-month rollups over parsed lines.
//!
//! Both rollups are pure functions of the accepted lines, independent of the
//! strategy that produced them.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::models::invoice::{ItemRollup, MonthlyRollup, ParsedLine, MONEY_DP};

/// Decimal places kept on rates.
const RATE_DP: u32 = 2;

/// Decimal places kept on month-over-month fractions.
const CHANGE_DP: u32 = 3;

#[derive(Default)]
struct ItemAccumulator<'a> {
    total_quantity: u64,
    total_value: Decimal,
    invoices: HashSet<&'a str>,
    names: IndexMap<&'a str, usize>,
    first_date: Option<NaiveDate>,
    last_date: Option<NaiveDate>,
}

impl<'a> ItemAccumulator<'a> {
    fn add(&mut self, line: &'a ParsedLine) {
        self.total_quantity += u64::from(line.quantity);
        self.total_value = self.total_value.saturating_add(line.line_total);

        if !line.invoice_number.is_empty() {
            self.invoices.insert(&line.invoice_number);
        }

        let name = line.item_name.trim();
        if !name.is_empty() {
            *self.names.entry(name).or_insert(0) += 1;
        }

        if let Some(date) = line.invoice_date {
            self.first_date = Some(self.first_date.map_or(date, |d| d.min(date)));
            self.last_date = Some(self.last_date.map_or(date, |d| d.max(date)));
        }
    }

    /// Most frequent name; ties go to the first one seen.
    fn best_name(&self) -> String {
        let mut best: Option<(&str, usize)> = None;
        for (name, count) in &self.names {
            if best.is_none_or(|(_, c)| *count > c) {
                best = Some((*name, *count));
            }
        }
        best.map(|(name, _)| name.to_string()).unwrap_or_default()
    }

    fn into_rollup(self, item_code: &str) -> ItemRollup {
        let invoice_count = self.invoices.len();
        let span = month_span(self.first_date, self.last_date);
        let frequency_per_month =
            (Decimal::from(invoice_count as u64) / Decimal::from(span)).round_dp(RATE_DP);

        let avg_price = if self.total_quantity == 0 {
            Decimal::ZERO
        } else {
            (self.total_value / Decimal::from(self.total_quantity)).round_dp(MONEY_DP)
        };

        ItemRollup {
            item_code: item_code.to_string(),
            item_name: self.best_name(),
            invoice_count,
            frequency_per_month,
            total_quantity: self.total_quantity,
            total_value: self.total_value.round_dp(MONEY_DP),
            avg_price,
            last_invoice_date: self.last_date,
        }
    }
}

/// Inclusive number of calendar months between two dates, at least 1.
/// Missing dates count as a span of one month.
pub fn month_span(first: Option<NaiveDate>, last: Option<NaiveDate>) -> u32 {
    match (first, last) {
        (Some(a), Some(b)) => {
            let months = (b.year() - a.year()) * 12 + (b.month() as i32 - a.month() as i32) + 1;
            months.max(1) as u32
        }
        _ => 1,
    }
}

/// Build per-item rollups, highest total value first.
///
/// The sort is stable, so items with equal value keep the order in which
/// their codes were first seen.
pub fn build_item_rollups(lines: &[ParsedLine]) -> Vec<ItemRollup> {
    let mut by_code: IndexMap<&str, ItemAccumulator> = IndexMap::new();
    for line in lines {
        by_code.entry(&line.item_code).or_default().add(line);
    }

    let mut rollups: Vec<ItemRollup> = by_code
        .into_iter()
        .map(|(code, acc)| acc.into_rollup(code))
        .collect();
    rollups.sort_by(|a, b| b.total_value.cmp(&a.total_value));
    rollups
}

/// Build per-month rollups in ascending month order. Undated lines are
/// excluded.
pub fn build_monthly_rollups(lines: &[ParsedLine]) -> Vec<MonthlyRollup> {
    let mut by_month: BTreeMap<String, (u64, Decimal)> = BTreeMap::new();
    for line in lines {
        if let Some(date) = line.invoice_date {
            let entry = by_month.entry(date.format("%Y-%m").to_string()).or_default();
            entry.0 += u64::from(line.quantity);
            entry.1 = entry.1.saturating_add(line.line_total);
        }
    }

    let mut monthly = Vec::with_capacity(by_month.len());
    let mut previous: Option<(u64, Decimal)> = None;

    for (month, (total_quantity, value)) in by_month {
        let total_value = value.round_dp(MONEY_DP);
        let (qty_change, val_change) = match previous {
            Some((prev_qty, prev_val)) => (
                change(Decimal::from(total_quantity), Decimal::from(prev_qty)),
                change(total_value, prev_val),
            ),
            None => (None, None),
        };

        monthly.push(MonthlyRollup {
            month,
            total_quantity,
            total_value,
            qty_month_over_month_pct: qty_change,
            val_month_over_month_pct: val_change,
        });
        previous = Some((total_quantity, total_value));
    }

    monthly
}

/// Relative change as a fraction, or `None` when the previous value is zero
/// or the change is not representable.
fn change(current: Decimal, previous: Decimal) -> Option<Decimal> {
    if previous.is_zero() {
        return None;
    }
    let fraction = current.checked_sub(previous)?.checked_div(previous)?;
    Some(fraction.round_dp(CHANGE_DP))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(code: &str, name: &str, invoice: &str, date: Option<&str>, qty: u32, total: &str) -> ParsedLine {
        let line_total = dec(total);
        ParsedLine {
            supplier: "Noble".to_string(),
            invoice_number: invoice.to_string(),
            invoice_date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            item_code: code.to_string(),
            item_name: name.to_string(),
            quantity: qty,
            unit_price: line_total / Decimal::from(qty.max(1)),
            line_total,
            file_name: format!("{invoice}.pdf"),
        }
    }

    #[test]
    fn test_month_span() {
        let d = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        assert_eq!(month_span(d("2024-01-15"), d("2024-01-20")), 1);
        assert_eq!(month_span(d("2024-01-31"), d("2024-03-01")), 3);
        assert_eq!(month_span(d("2023-11-01"), d("2024-02-01")), 4);
        assert_eq!(month_span(None, d("2024-02-01")), 1);
    }

    #[test]
    fn test_item_rollups() {
        let lines = vec![
            line("a100", "Widget", "111111-01", Some("2024-01-10"), 5, "50.00"),
            line("b200", "Bolt", "111111-01", Some("2024-01-10"), 10, "5.00"),
            line("a100", "Blue widget", "222222-01", Some("2024-03-02"), 3, "30.00"),
            line("a100", "Blue widget", "333333-01", Some("2024-02-02"), 2, "20.00"),
            line("a100", "", "333333-01", Some("2024-02-02"), 1, "10.00"),
        ];

        let rollups = build_item_rollups(&lines);
        assert_eq!(rollups.len(), 2);

        let a = &rollups[0];
        assert_eq!(a.item_code, "a100");
        assert_eq!(a.item_name, "Blue widget");
        assert_eq!(a.invoice_count, 3);
        assert_eq!(a.total_quantity, 11);
        assert_eq!(a.total_value, dec("110.00"));
        assert_eq!(a.avg_price, dec("10.00"));
        assert_eq!(a.frequency_per_month, dec("1.00"));
        assert_eq!(a.last_invoice_date, NaiveDate::from_ymd_opt(2024, 3, 2));

        assert_eq!(rollups[1].item_code, "b200");
        assert_eq!(rollups[1].avg_price, dec("0.50"));
    }

    #[test]
    fn test_name_tie_goes_to_first_seen() {
        let lines = vec![
            line("x", "Second", "1", None, 1, "1.00"),
            line("x", "First", "2", None, 1, "1.00"),
        ];
        assert_eq!(build_item_rollups(&lines)[0].item_name, "Second");
    }

    #[test]
    fn test_equal_values_keep_first_seen_order() {
        let lines = vec![
            line("c", "", "1", None, 1, "5.00"),
            line("a", "", "1", None, 1, "9.00"),
            line("b", "", "1", None, 1, "5.00"),
        ];
        let codes: Vec<String> = build_item_rollups(&lines)
            .into_iter()
            .map(|r| r.item_code)
            .collect();
        assert_eq!(codes, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_frequency_rounding() {
        let lines = vec![
            line("x", "", "1", Some("2024-01-01"), 1, "1.00"),
            line("x", "", "2", Some("2024-03-01"), 1, "1.00"),
        ];
        // 2 invoices over 3 months
        assert_eq!(build_item_rollups(&lines)[0].frequency_per_month, dec("0.67"));
    }

    #[test]
    fn test_avg_price_zero_quantity() {
        let acc = ItemAccumulator::default();
        let rollup = acc.into_rollup("empty");
        assert_eq!(rollup.avg_price, Decimal::ZERO);
        assert_eq!(rollup.frequency_per_month, Decimal::ZERO);
    }

    #[test]
    fn test_monthly_rollups() {
        let lines = vec![
            line("a", "", "1", Some("2024-02-03"), 3, "30.00"),
            line("a", "", "2", Some("2024-01-10"), 2, "20.00"),
            line("b", "", "2", Some("2024-01-11"), 2, "20.00"),
            line("a", "", "3", None, 100, "999.00"),
            line("a", "", "4", Some("2024-04-01"), 1, "10.00"),
        ];

        let monthly = build_monthly_rollups(&lines);
        let months: Vec<&str> = monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-04"]);

        assert_eq!(monthly[0].total_quantity, 4);
        assert_eq!(monthly[0].total_value, dec("40.00"));
        assert_eq!(monthly[0].qty_month_over_month_pct, None);
        assert_eq!(monthly[0].val_month_over_month_pct, None);

        assert_eq!(monthly[1].qty_month_over_month_pct, Some(dec("-0.25")));
        assert_eq!(monthly[1].val_month_over_month_pct, Some(dec("-0.25")));

        assert_eq!(monthly[2].qty_month_over_month_pct, Some(dec("-0.667")));
    }

    #[test]
    fn test_monthly_zero_predecessor() {
        let lines = vec![
            line("a", "", "1", Some("2024-01-10"), 1, "0.00"),
            line("a", "", "2", Some("2024-02-10"), 2, "5.00"),
        ];

        let monthly = build_monthly_rollups(&lines);
        assert_eq!(monthly[1].qty_month_over_month_pct, Some(dec("1")));
        assert_eq!(monthly[1].val_month_over_month_pct, None);
    }

    #[test]
    fn test_huge_totals_saturate() {
        let huge = "50000000000000000000000000000";
        let lines = vec![
            line("a100", "Widget", "111111-01", Some("2024-01-10"), 1, huge),
            line("a100", "Widget", "111111-02", Some("2024-01-20"), 1, huge),
            line("a100", "Widget", "111111-03", Some("2024-02-05"), 1, "0.01"),
        ];

        let master = build_item_rollups(&lines);
        assert_eq!(master[0].total_value, Decimal::MAX.round_dp(MONEY_DP));

        let monthly = build_monthly_rollups(&lines);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].total_value, Decimal::MAX.round_dp(MONEY_DP));
        assert_eq!(monthly[1].qty_month_over_month_pct, Some(dec("-0.500")));
    }

    #[test]
    fn test_change_out_of_range_is_none() {
        assert_eq!(change(Decimal::MAX, dec("0.01")), None);
        assert_eq!(change(Decimal::MIN, dec("1")), None);
        assert_eq!(change(dec("15"), dec("10")), Some(dec("0.500")));
    }
}
