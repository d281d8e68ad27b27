//! Invoice field and line-item extraction module.

mod delegate;
pub mod excerpt;
mod header;
mod lines;
mod parser;
pub mod rules;

pub use delegate::{
    extract_json_object, parse_normalization, NormalizedInvoice, NormalizedLine, Normalizer,
};
pub use header::HeaderInference;
pub use lines::{LineItemExtractor, Rejection};
pub use parser::{
    build_extractor, DelegateParser, ExtractionResult, HeuristicParser, HybridParser,
};

use async_trait::async_trait;

use crate::pdf::PdfContent;

/// Trait for invoice extractors.
///
/// Implementations never fail: problems surface as an empty item list and
/// entries in [`ExtractionResult::warnings`].
#[async_trait]
pub trait InvoiceExtractor: Send + Sync {
    /// Extract the header and line items of one document.
    async fn extract(&self, content: &PdfContent, file_name: &str) -> ExtractionResult;
}
