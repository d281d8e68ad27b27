//! Core library for invoice line-item extraction and rollups.
//!
//! This crate provides:
//! - ZIP archive unpacking and PDF word/position extraction
//! - Visual line reconstruction and line-item heuristics
//! - Header inference (invoice number, date, supplier)
//! - A pluggable normalization delegate for layouts the heuristics miss
//! - Per-item and per-month rollups, and chunked persistence

pub mod archive;
pub mod error;
pub mod ingest;
pub mod invoice;
pub mod layout;
pub mod models;
pub mod pdf;
pub mod rollup;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;

pub use archive::ArchiveInput;
pub use error::{InvrollError, Result};
pub use ingest::Ingestor;
pub use invoice::{ExtractionResult, InvoiceExtractor, NormalizedInvoice, Normalizer};
pub use layout::{group_lines, Token, VisualLine};
pub use models::config::{ExtractionStrategy, InvrollConfig};
pub use models::invoice::{
    IngestReport, InvoiceHeader, InvoiceRecord, ItemRollup, LineItem, MonthlyRollup, ParsedLine,
};
pub use pdf::{PdfContent, PdfExtractor, PdfProcessor};
pub use store::{persist, PersistStats, RecordStore};
