//! Persistence of ingest results to a record store.
//!
//! Writes are best-effort and chunked: a failed chunk is reported in the
//! report's errors and does not undo chunks already written.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::config::StoreConfig;
use crate::models::invoice::{IngestReport, InvoiceRecord, ParsedLine};

/// Remote table store for invoices and their line items.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or update invoice rows keyed on `invoice_number`.
    async fn upsert_invoices(&self, table: &str, rows: &[InvoiceRecord]) -> Result<(), StoreError>;

    /// Append line-item rows.
    async fn insert_items(&self, table: &str, rows: &[ParsedLine]) -> Result<(), StoreError>;
}

/// Rows accepted by the store in one persist run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub invoices_written: usize,
    pub items_written: usize,
    pub failed_chunks: usize,
}

/// Write invoices, then items, in chunks of `config.chunk_size`.
///
/// Chunk failures are appended to `report.errors` as
/// `store: <table> chunk <n> failed: <e>` with `n` counted from 1.
pub async fn persist(
    store: &dyn RecordStore,
    report: &mut IngestReport,
    config: &StoreConfig,
) -> PersistStats {
    let chunk_size = config.chunk_size.max(1);
    let mut stats = PersistStats::default();

    for (i, chunk) in report.invoices.chunks(chunk_size).enumerate() {
        match store.upsert_invoices(&config.invoices_table, chunk).await {
            Ok(()) => stats.invoices_written += chunk.len(),
            Err(e) => {
                warn!("{} chunk {} failed: {}", config.invoices_table, i + 1, e);
                report.errors.push(format!(
                    "store: {} chunk {} failed: {}",
                    config.invoices_table,
                    i + 1,
                    e
                ));
                stats.failed_chunks += 1;
            }
        }
    }

    for (i, chunk) in report.parsed_lines.chunks(chunk_size).enumerate() {
        match store.insert_items(&config.items_table, chunk).await {
            Ok(()) => stats.items_written += chunk.len(),
            Err(e) => {
                warn!("{} chunk {} failed: {}", config.items_table, i + 1, e);
                report.errors.push(format!(
                    "store: {} chunk {} failed: {}",
                    config.items_table,
                    i + 1,
                    e
                ));
                stats.failed_chunks += 1;
            }
        }
    }

    info!(
        "Persisted {} invoices and {} items ({} failed chunks)",
        stats.invoices_written, stats.items_written, stats.failed_chunks
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::InvoiceHeader;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    /// Records calls and rejects the item chunk with the given index.
    #[derive(Default)]
    struct FakeStore {
        calls: Mutex<Vec<(String, usize)>>,
        fail_item_chunk: Option<usize>,
    }

    #[async_trait]
    impl RecordStore for FakeStore {
        async fn upsert_invoices(&self, table: &str, rows: &[InvoiceRecord]) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push((table.to_string(), rows.len()));
            Ok(())
        }

        async fn insert_items(&self, table: &str, rows: &[ParsedLine]) -> Result<(), StoreError> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.iter().filter(|(t, _)| t == table).count();
            calls.push((table.to_string(), rows.len()));
            if self.fail_item_chunk == Some(index) {
                return Err(StoreError::Rejected {
                    table: table.to_string(),
                    status: 400,
                    body: "bad row".to_string(),
                });
            }
            Ok(())
        }
    }

    fn report(invoices: usize, lines: usize) -> IngestReport {
        let header = InvoiceHeader {
            invoice_number: "123456-01".to_string(),
            invoice_date: None,
            supplier: String::new(),
        };
        let record = InvoiceRecord::from_lines(&header, "a.pdf", &[]);
        let line = ParsedLine {
            supplier: String::new(),
            invoice_number: "123456-01".to_string(),
            invoice_date: None,
            item_code: "a".to_string(),
            item_name: String::new(),
            quantity: 1,
            unit_price: Decimal::ONE,
            line_total: Decimal::ONE,
            file_name: "a.pdf".to_string(),
        };

        IngestReport {
            invoices: vec![record; invoices],
            parsed_lines: vec![line; lines],
            ..Default::default()
        }
    }

    fn config(chunk_size: usize) -> StoreConfig {
        StoreConfig {
            chunk_size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_chunks_in_order() {
        let store = FakeStore::default();
        let mut report = report(3, 5);

        let stats = persist(&store, &mut report, &config(2)).await;

        assert_eq!(
            stats,
            PersistStats {
                invoices_written: 3,
                items_written: 5,
                failed_chunks: 0,
            }
        );
        let calls = store.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("invoices".to_string(), 2),
                ("invoices".to_string(), 1),
                ("items".to_string(), 2),
                ("items".to_string(), 2),
                ("items".to_string(), 1),
            ]
        );
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_failed_chunk_is_reported_and_others_kept() {
        let store = FakeStore {
            fail_item_chunk: Some(1),
            ..Default::default()
        };
        let mut report = report(1, 3);

        let stats = persist(&store, &mut report, &config(1)).await;

        assert_eq!(stats.items_written, 2);
        assert_eq!(stats.failed_chunks, 1);
        assert_eq!(report.parsed_lines.len(), 3);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("store: items chunk 2 failed:"));
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_treated_as_one() {
        let store = FakeStore::default();
        let mut report = report(2, 0);
        let stats = persist(&store, &mut report, &config(0)).await;
        assert_eq!(stats.invoices_written, 2);
        assert_eq!(store.calls.lock().unwrap().len(), 2);
    }
}
