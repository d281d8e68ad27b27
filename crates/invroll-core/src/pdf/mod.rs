//! PDF processing module.

mod extractor;
mod tokens;

pub use extractor::PdfExtractor;
pub use tokens::{TextMatrix, TokenCollector};

use tracing::warn;

use crate::error::PdfError;
use crate::layout::Token;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Extracted content from a PDF.
#[derive(Debug, Clone, Default)]
pub struct PdfContent {
    /// Full document text.
    pub text: String,
    /// Pages with their content.
    pub pages: Vec<PdfPage>,
}

impl PdfContent {
    /// Page texts in page order.
    pub fn page_texts(&self) -> Vec<String> {
        self.pages.iter().map(|p| p.text.clone()).collect()
    }
}

/// Content from a single PDF page.
#[derive(Debug, Clone, Default)]
pub struct PdfPage {
    /// Page number (1-indexed).
    pub number: u32,
    /// Plain text of the page.
    pub text: String,
    /// Positioned word tokens of the page.
    pub tokens: Vec<Token>,
}

/// Trait for PDF text and word-position extraction.
pub trait PdfProcessor: Send {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract text from the entire PDF.
    fn extract_text(&self) -> Result<String>;

    /// Extract text from a specific page.
    fn extract_page_text(&self, page: u32) -> Result<String>;

    /// Extract positioned word tokens from a specific page.
    fn extract_page_tokens(&self, page: u32) -> Result<Vec<Token>>;

    /// Extract text and tokens of every page.
    ///
    /// A page that fails to decode contributes no tokens instead of failing
    /// the document.
    fn extract_all(&self) -> Result<PdfContent> {
        let page_count = self.page_count();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        let mut pages = Vec::with_capacity(page_count as usize);
        for number in 1..=page_count {
            let text = self.extract_page_text(number).unwrap_or_else(|e| {
                warn!("page {} text unavailable: {}", number, e);
                String::new()
            });
            let tokens = self.extract_page_tokens(number).unwrap_or_else(|e| {
                warn!("page {} tokens unavailable: {}", number, e);
                Vec::new()
            });
            pages.push(PdfPage {
                number,
                text,
                tokens,
            });
        }

        let text = match self.extract_text() {
            Ok(text) if !text.trim().is_empty() => text,
            _ => pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        };

        Ok(PdfContent { text, pages })
    }
}
