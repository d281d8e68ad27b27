//! Error types for the invroll-core library.

use thiserror::Error;

/// Main error type for the invroll library.
#[derive(Error, Debug)]
pub enum InvrollError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Archive unpacking error.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Line-item or header extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Remote store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to decode a page content stream.
    #[error("failed to decode content of page {page}: {reason}")]
    Content { page: u32, reason: String },

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to reading uploaded archives.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The archive could not be opened as a ZIP file.
    #[error("zip read failed: {0}")]
    Open(String),

    /// A single entry could not be read.
    #[error("failed to read entry {name}: {reason}")]
    Entry { name: String, reason: String },
}

/// Errors related to invoice field extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Failed to parse a value.
    #[error("failed to parse {field}: {value}")]
    Parse { field: String, value: String },

    /// Field validation failed.
    #[error("validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },
}

impl ExtractionError {
    pub(crate) fn parse(field: &str, value: &str) -> Self {
        Self::Parse {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors reported by a remote record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store rejected the request.
    #[error("request to {table} rejected with status {status}: {body}")]
    Rejected {
        table: String,
        status: u16,
        body: String,
    },

    /// The store could not be reached.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The store is not configured.
    #[error("store not configured: {0}")]
    NotConfigured(String),
}

/// Result type for the invroll library.
pub type Result<T> = std::result::Result<T, InvrollError>;
