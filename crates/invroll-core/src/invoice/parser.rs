//! Extraction strategies: layout heuristics, the normalization delegate, and
//! a hybrid that calls the delegate only when the heuristics find nothing.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::InvrollError;
use crate::layout::group_lines;
use crate::models::config::{ExcerptPolicy, ExtractionStrategy, InvrollConfig};
use crate::models::invoice::{InvoiceHeader, LineItem};
use crate::pdf::PdfContent;

use super::delegate::{NormalizedInvoice, Normalizer};
use super::excerpt::build_excerpts;
use super::header::HeaderInference;
use super::lines::LineItemExtractor;
use super::InvoiceExtractor;

/// Result of invoice extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Inferred header fields.
    pub header: InvoiceHeader,
    /// Accepted line items in page order.
    pub items: Vec<LineItem>,
    /// Degraded-path messages (delegate failures).
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Layout heuristics over positioned page tokens.
pub struct HeuristicParser {
    y_tolerance: f32,
    lines: LineItemExtractor,
    header: HeaderInference,
}

impl HeuristicParser {
    pub fn new(y_tolerance: f32, lines: LineItemExtractor, header: HeaderInference) -> Self {
        Self {
            y_tolerance,
            lines,
            header,
        }
    }

    /// Create a heuristic parser from configuration.
    pub fn from_config(config: &InvrollConfig) -> Result<Self, InvrollError> {
        Ok(Self::new(
            config.layout.y_tolerance,
            LineItemExtractor::from_config(&config.extraction),
            HeaderInference::from_config(&config.extraction)?,
        ))
    }

    /// Line items of every page, concatenated in page order.
    pub fn extract_items(&self, content: &PdfContent) -> Vec<LineItem> {
        let mut items = Vec::new();
        for page in &content.pages {
            let lines = group_lines(&page.tokens, self.y_tolerance);
            let found = self.lines.extract(&lines);
            debug!(
                "Page {}: {} visual lines, {} line items",
                page.number,
                lines.len(),
                found.len()
            );
            items.extend(found);
        }
        items
    }
}

#[async_trait]
impl InvoiceExtractor for HeuristicParser {
    async fn extract(&self, content: &PdfContent, file_name: &str) -> ExtractionResult {
        let start = Instant::now();
        ExtractionResult {
            header: self.header.infer(&content.text, file_name),
            items: self.extract_items(content),
            warnings: Vec::new(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Normalization through an external reasoning service.
pub struct DelegateParser {
    normalizer: Arc<dyn Normalizer>,
    excerpt: ExcerptPolicy,
    header: HeaderInference,
    tolerance_ratio: Decimal,
}

impl DelegateParser {
    pub fn new(
        normalizer: Arc<dyn Normalizer>,
        excerpt: ExcerptPolicy,
        header: HeaderInference,
        tolerance_ratio: Decimal,
    ) -> Self {
        Self {
            normalizer,
            excerpt,
            header,
            tolerance_ratio,
        }
    }

    /// Create a delegate parser from configuration.
    pub fn from_config(
        config: &InvrollConfig,
        normalizer: Arc<dyn Normalizer>,
    ) -> Result<Self, InvrollError> {
        Ok(Self::new(
            normalizer,
            config.delegate.excerpt.clone(),
            HeaderInference::from_config(&config.extraction)?,
            config.extraction.tolerance(),
        ))
    }

    async fn normalize(&self, content: &PdfContent, file_name: &str) -> NormalizedInvoice {
        let mut pages = content.page_texts();
        if pages.iter().all(|p| p.trim().is_empty()) {
            pages = vec![content.text.clone()];
        }

        let excerpts = build_excerpts(&pages, &self.excerpt);
        if excerpts.is_empty() {
            debug!("{}: no text to normalize", file_name);
            return NormalizedInvoice::default();
        }

        let mut results = Vec::with_capacity(excerpts.len());
        for excerpt in &excerpts {
            results.push(self.normalizer.normalize(excerpt, file_name).await);
        }
        NormalizedInvoice::merge_pages(results)
    }
}

#[async_trait]
impl InvoiceExtractor for DelegateParser {
    async fn extract(&self, content: &PdfContent, file_name: &str) -> ExtractionResult {
        let start = Instant::now();
        let normalized = self.normalize(content, file_name).await;

        let mut warnings = Vec::new();
        if let Some(e) = &normalized.error {
            warn!("{}: normalization failed: {}", file_name, e);
            warnings.push(e.clone());
        }

        ExtractionResult {
            header: self.header.merge(&normalized, &content.text, file_name),
            items: normalized.line_items(self.tolerance_ratio),
            warnings,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Heuristics first; the delegate only for documents without line items.
pub struct HybridParser {
    heuristic: HeuristicParser,
    delegate: DelegateParser,
}

impl HybridParser {
    pub fn new(heuristic: HeuristicParser, delegate: DelegateParser) -> Self {
        Self {
            heuristic,
            delegate,
        }
    }
}

#[async_trait]
impl InvoiceExtractor for HybridParser {
    async fn extract(&self, content: &PdfContent, file_name: &str) -> ExtractionResult {
        let result = self.heuristic.extract(content, file_name).await;
        if !result.items.is_empty() {
            return result;
        }

        debug!("{}: no heuristic line items, asking the delegate", file_name);
        self.delegate.extract(content, file_name).await
    }
}

/// Build the extractor selected by `extraction.strategy`.
///
/// Delegate and hybrid strategies need a normalizer; without one they fall
/// back to heuristics.
pub fn build_extractor(
    config: &InvrollConfig,
    normalizer: Option<Arc<dyn Normalizer>>,
) -> Result<Box<dyn InvoiceExtractor>, InvrollError> {
    let strategy = config.extraction.strategy;
    let heuristic = HeuristicParser::from_config(config)?;

    let extractor: Box<dyn InvoiceExtractor> = match (strategy, normalizer) {
        (ExtractionStrategy::Heuristic, _) => Box::new(heuristic),
        (ExtractionStrategy::Delegate, Some(normalizer)) => {
            Box::new(DelegateParser::from_config(config, normalizer)?)
        }
        (ExtractionStrategy::Hybrid, Some(normalizer)) => Box::new(HybridParser::new(
            heuristic,
            DelegateParser::from_config(config, normalizer)?,
        )),
        (strategy, None) => {
            warn!("{:?} strategy without a normalizer, using heuristics", strategy);
            Box::new(heuristic)
        }
    };

    info!("Extraction strategy: {:?}", strategy);
    Ok(extractor)
}
