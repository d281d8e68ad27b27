//! Invoice date inference.

use chrono::NaiveDate;

use super::patterns::{DATE_IN_FILE_NAME, DATE_ISO, DATE_SLASH};

/// Input date formats accepted for normalization, tried in order.
pub const ACCEPTED_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

/// Normalize a date string in one of [`ACCEPTED_DATE_FORMATS`].
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    ACCEPTED_DATE_FORMATS.iter().find_map(|fmt| {
        // chrono reads `%Y` greedily from two digits as well, so year width
        // picks the format for slash dates.
        if fmt.ends_with("%Y") && year_width(raw) != 4 {
            return None;
        }
        NaiveDate::parse_from_str(raw, fmt).ok()
    })
}

fn year_width(raw: &str) -> usize {
    raw.rsplit('/').next().map(str::len).unwrap_or(0)
}

/// Infer the invoice date from document text, then from the file name.
///
/// Rules are tried in order and stop at the first real calendar date: ISO
/// dates, then slash dates, then `_YYYYMMDD_` in the file name.
pub fn infer_invoice_date(text: &str, file_name: &str) -> Option<NaiveDate> {
    let iso = DATE_ISO
        .captures_iter(text)
        .find_map(|caps| normalize_date(&caps[1]));
    if iso.is_some() {
        return iso;
    }

    let slash = DATE_SLASH
        .captures_iter(text)
        .find_map(|caps| normalize_date(&caps[1]));
    if slash.is_some() {
        return slash;
    }

    date_from_file_name(file_name)
}

/// Read a `_YYYYMMDD_` date embedded in a file name.
pub fn date_from_file_name(file_name: &str) -> Option<NaiveDate> {
    let caps = DATE_IN_FILE_NAME.captures(file_name)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
