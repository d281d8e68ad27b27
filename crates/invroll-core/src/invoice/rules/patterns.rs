//! Common regex patterns for invoice extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Currency amount token: optional $, optional thousands groups, two
    // decimals, optional trailing minus for credits.
    pub static ref MONEY_TOKEN: Regex = Regex::new(
        r"^\$?(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2}-?$"
    ).unwrap();

    // Item code token
    pub static ref ITEM_CODE: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9\-/.]*$"
    ).unwrap();

    // Invoice number patterns
    pub static ref INVOICE_NUMBER_DASHED: Regex = Regex::new(
        r"\b(\d{6,9}-\d{2})\b"
    ).unwrap();

    pub static ref INVOICE_NUMBER_LABELED: Regex = Regex::new(
        r"(?i)\bINV(?:OICE)?\s*#?\s*([A-Z0-9\-]{6,})\b"
    ).unwrap();

    // Date patterns
    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4}-\d{2}-\d{2})\b"
    ).unwrap();

    pub static ref DATE_SLASH: Regex = Regex::new(
        r"\b(\d{2}/\d{2}/\d{2,4})\b"
    ).unwrap();

    pub static ref DATE_IN_FILE_NAME: Regex = Regex::new(
        r"_(20\d{2})(\d{2})(\d{2})_"
    ).unwrap();
}
