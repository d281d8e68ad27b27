//! PDF text and word extraction using lopdf and pdf-extract.

use std::collections::BTreeMap;
use std::panic;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::tokens::{decode_bytes, TokenCollector};
use super::{PdfProcessor, Result};
use crate::error::PdfError;
use crate::layout::Token;

/// US Letter height, used when a page has no usable media box.
const DEFAULT_PAGE_TOP: f32 = 792.0;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    fn page_id(&self, doc: &Document, page: u32) -> Result<ObjectId> {
        doc.get_pages()
            .get(&page)
            .copied()
            .ok_or(PdfError::InvalidPage(page))
    }

    /// Upper edge of the page's media box, handling inheritance.
    fn page_top(&self, doc: &Document, page_id: ObjectId) -> f32 {
        inherited_attribute(doc, page_id, b"MediaBox")
            .and_then(|obj| match obj {
                Object::Array(values) if values.len() == 4 => {
                    let lower = number(&values[1])?;
                    let upper = number(&values[3])?;
                    Some(lower.max(upper))
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_PAGE_TOP)
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // Save decrypted document to raw_data for pdf_extract
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        self.document()?;
        // pdf-extract panics on some malformed font programs.
        let data: &[u8] = &self.raw_data;
        match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data)) {
            Ok(result) => result.map_err(|e| PdfError::TextExtraction(e.to_string())),
            Err(_) => Err(PdfError::TextExtraction(
                "text extractor panicked".to_string(),
            )),
        }
    }

    fn extract_page_text(&self, page: u32) -> Result<String> {
        let doc = self.document()?;
        self.page_id(doc, page)?;
        doc.extract_text(&[page])
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    fn extract_page_tokens(&self, page: u32) -> Result<Vec<Token>> {
        let doc = self.document()?;
        let page_id = self.page_id(doc, page)?;

        let data = doc
            .get_page_content(page_id)
            .map_err(|e| PdfError::Content {
                page,
                reason: e.to_string(),
            })?;
        let content = Content::decode(&data).map_err(|e| PdfError::Content {
            page,
            reason: e.to_string(),
        })?;

        let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
        let decode = |font: &[u8], bytes: &[u8]| decode_with_font(doc, &fonts, font, bytes);
        let tokens = TokenCollector::new(self.page_top(doc, page_id), decode)
            .run(&content.operations);

        trace!("Page {}: {} tokens", page, tokens.len());
        Ok(tokens)
    }
}

fn decode_with_font(
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    font: &[u8],
    bytes: &[u8],
) -> String {
    if let Some(font_dict) = fonts.get(font) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return text;
            }
        }
    }
    decode_bytes(bytes)
}

/// Look up a page attribute, walking up the page tree for inherited values.
fn inherited_attribute<'a>(doc: &'a Document, node_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = node_id;
    // Bounded walk so a cyclic Parent chain cannot loop forever.
    for _ in 0..32 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current = *parent_id,
            _ => return None,
        }
    }
    None
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
