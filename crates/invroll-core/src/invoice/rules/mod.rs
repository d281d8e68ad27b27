//! Rule-based field extractors for invoices.

pub mod amounts;
pub mod dates;
pub mod number;
pub mod patterns;
pub mod supplier;

pub use amounts::{is_money, is_quantity, parse_money, parse_quantity};
pub use dates::{date_from_file_name, infer_invoice_date, normalize_date, ACCEPTED_DATE_FORMATS};
pub use number::{base_name, file_stem, infer_invoice_number};
pub use patterns::*;
pub use supplier::{guess_from_first_line, SupplierMatcher};
