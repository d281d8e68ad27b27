//! Batch ingestion: archives in, report out.
//!
//! Archives and their PDF entries are processed sequentially. A failing
//! archive or document is recorded in the report and skipped; the batch
//! itself never fails.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::archive::{read_pdf_entries, ArchiveInput, PdfEntry};
use crate::error::{ArchiveError, InvrollError};
use crate::invoice::rules::{base_name, infer_invoice_number};
use crate::invoice::{build_extractor, InvoiceExtractor, Normalizer};
use crate::models::config::InvrollConfig;
use crate::models::invoice::{IngestReport, InvoiceRecord, ParsedLine};
use crate::pdf::{PdfContent, PdfExtractor, PdfProcessor};
use crate::rollup::{build_item_rollups, build_monthly_rollups};

/// Creates a fresh PDF processor for each document.
pub type PdfFactory = Box<dyn Fn() -> Box<dyn PdfProcessor> + Send + Sync>;

/// Runs extraction over uploaded archives and builds the report.
pub struct Ingestor {
    extractor: Box<dyn InvoiceExtractor>,
    pdf_factory: PdfFactory,
}

impl Ingestor {
    /// Create an ingestor around an extractor, reading PDFs with lopdf.
    pub fn new(extractor: Box<dyn InvoiceExtractor>) -> Self {
        Self {
            extractor,
            pdf_factory: Box::new(|| Box::new(PdfExtractor::new())),
        }
    }

    /// Create an ingestor for the configured strategy.
    pub fn from_config(
        config: &InvrollConfig,
        normalizer: Option<Arc<dyn Normalizer>>,
    ) -> Result<Self, InvrollError> {
        Ok(Self::new(build_extractor(config, normalizer)?))
    }

    /// Use a different PDF backend.
    pub fn with_pdf_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn PdfProcessor> + Send + Sync + 'static,
    {
        self.pdf_factory = Box::new(factory);
        self
    }

    /// Ingest a batch of archives.
    pub async fn ingest(&self, archives: &[ArchiveInput]) -> IngestReport {
        self.ingest_with_progress(archives, |_| {}).await
    }

    /// Ingest a batch of archives, calling `on_archive` after each one.
    pub async fn ingest_with_progress<P>(
        &self,
        archives: &[ArchiveInput],
        mut on_archive: P,
    ) -> IngestReport
    where
        P: FnMut(&ArchiveInput),
    {
        let mut batch = Batch::default();

        for archive in archives {
            info!("Processing archive {}", archive.name);
            match read_pdf_entries(&archive.bytes) {
                Ok(entries) => {
                    for entry in entries {
                        batch.report.files_processed += 1;
                        match entry {
                            Ok(entry) => self.ingest_document(&mut batch, entry).await,
                            Err(ArchiveError::Entry { name, reason }) => batch
                                .report
                                .errors
                                .push(format!("{}: pdf open failed: {}", name, reason)),
                            Err(e) => batch.report.errors.push(format!("{}: {}", archive.name, e)),
                        }
                    }
                }
                Err(e) => {
                    info!("Skipping archive {}: {}", archive.name, e);
                    batch.report.errors.push(format!("{}: {}", archive.name, e));
                }
            }
            on_archive(archive);
        }

        batch.finish()
    }

    async fn ingest_document(&self, batch: &mut Batch, entry: PdfEntry) {
        let content = match self.load(&entry.bytes) {
            Ok(content) => content,
            Err(e) => {
                info!("Skipping {}: {}", entry.name, e);
                batch
                    .report
                    .errors
                    .push(format!("{}: pdf open failed: {}", entry.name, e));
                return;
            }
        };

        let file_name = base_name(&entry.name);
        let text_number = infer_invoice_number(&content.text, &entry.name);
        if batch.seen.contains(&text_number) {
            batch.skip_duplicate(&entry.name, &text_number, file_name);
            return;
        }

        let result = self.extractor.extract(&content, &entry.name).await;
        let header = result.header;
        if !batch.seen.insert(header.invoice_number.clone()) {
            batch.skip_duplicate(&entry.name, &header.invoice_number, file_name);
            return;
        }

        for warning in &result.warnings {
            batch
                .report
                .errors
                .push(format!("{}: normalization failed: {}", entry.name, warning));
        }

        let lines: Vec<ParsedLine> = result
            .items
            .into_iter()
            .map(|item| ParsedLine::new(item, &header, &file_name))
            .collect();

        info!(
            "{}: invoice {} with {} line items in {} ms",
            entry.name,
            header.invoice_number,
            lines.len(),
            result.processing_time_ms
        );

        batch
            .report
            .invoices
            .push(InvoiceRecord::from_lines(&header, &file_name, &lines));
        batch.report.parsed_lines.extend(lines);
    }

    fn load(&self, bytes: &[u8]) -> crate::pdf::Result<PdfContent> {
        let mut pdf = (self.pdf_factory)();
        pdf.load(bytes)?;
        let content = pdf.extract_all()?;
        debug!(
            "Loaded {} pages, {} chars of text",
            content.pages.len(),
            content.text.len()
        );
        Ok(content)
    }
}

/// State of one ingest call.
#[derive(Default)]
struct Batch {
    report: IngestReport,
    seen: HashSet<String>,
}

impl Batch {
    fn skip_duplicate(&mut self, entry: &str, invoice_number: &str, file_name: String) {
        info!("Skipping {}: invoice {} already seen", entry, invoice_number);
        self.report.duplicates.push(file_name);
    }

    fn finish(mut self) -> IngestReport {
        self.report.master = build_item_rollups(&self.report.parsed_lines);
        self.report.monthly = build_monthly_rollups(&self.report.parsed_lines);
        self.report
    }
}
