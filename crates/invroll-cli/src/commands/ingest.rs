//! Ingest command - extract line items from ZIP archives and roll them up.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use invroll_core::models::invoice::{IngestReport, ItemRollup};
use invroll_core::{persist, ArchiveInput, ExtractionStrategy, Ingestor, InvrollConfig, Normalizer};
use invroll_remote::{ChatNormalizer, RestStore};

use super::config::load_config;

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Input ZIP archives or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Extraction strategy (overrides the config file)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Output file for the JSON report (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the per-item rollup as CSV
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Write invoices and line items to the configured record store
    #[arg(long)]
    persist: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum StrategyArg {
    /// Layout heuristics only
    Heuristic,
    /// Reasoning service only
    Delegate,
    /// Heuristics, then the reasoning service for documents without lines
    Hybrid,
}

impl From<StrategyArg> for ExtractionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Heuristic => ExtractionStrategy::Heuristic,
            StrategyArg::Delegate => ExtractionStrategy::Delegate,
            StrategyArg::Hybrid => ExtractionStrategy::Hybrid,
        }
    }
}

pub async fn run(args: IngestArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(strategy) = args.strategy {
        config.extraction.strategy = strategy.into();
    }

    // Fail before doing any work when persistence cannot happen.
    let store = if args.persist {
        Some(RestStore::from_config(&config.store)?)
    } else {
        None
    };

    let (archives, mut read_errors) = read_inputs(&args.inputs);
    info!("Read {} archives", archives.len());

    let ingestor = Ingestor::from_config(&config, normalizer(&config))?;

    let pb = ProgressBar::new(archives.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} archives {msg}")?
            .progress_chars("=>-"),
    );

    let mut report = ingestor
        .ingest_with_progress(&archives, |archive| {
            pb.set_message(archive.name.clone());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    read_errors.append(&mut report.errors);
    report.errors = read_errors;

    if let Some(store) = &store {
        let stats = persist(store, &mut report, &config.store).await;
        eprintln!(
            "{} Stored {} invoices and {} line items",
            style("✓").green(),
            stats.invoices_written,
            stats.items_written
        );
        if stats.failed_chunks > 0 {
            eprintln!(
                "{} {} chunks were rejected by the store",
                style("⚠").yellow(),
                stats.failed_chunks
            );
        }
    }

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &json)?;
            debug!("Wrote report to {}", path.display());
        }
        None => println!("{}", json),
    }

    if let Some(path) = &args.summary {
        write_summary(path, &report.master)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            path.display()
        );
    }

    print_summary(&report, start);

    Ok(())
}

/// The reasoning-service client, when the strategy needs one and it is
/// configured.
fn normalizer(config: &InvrollConfig) -> Option<Arc<dyn Normalizer>> {
    if config.extraction.strategy == ExtractionStrategy::Heuristic {
        return None;
    }

    match ChatNormalizer::from_config(&config.delegate) {
        Ok(normalizer) => Some(Arc::new(normalizer)),
        Err(e) => {
            warn!("Normalization delegate unavailable: {}", e);
            None
        }
    }
}

/// Expand inputs and read archive files.
///
/// Unreadable files and patterns without matches are reported the same way
/// as corrupt archives instead of aborting the run.
fn read_inputs(inputs: &[String]) -> (Vec<ArchiveInput>, Vec<String>) {
    let mut archives = Vec::new();
    let mut errors = Vec::new();

    for input in inputs {
        for path in expand_input(input, &mut errors) {
            let name = display_name(&path);
            match fs::read(&path) {
                Ok(bytes) => archives.push(ArchiveInput::new(name, bytes)),
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    errors.push(format!("{}: read failed: {}", name, e));
                }
            }
        }
    }

    (archives, errors)
}

fn expand_input(input: &str, errors: &mut Vec<String>) -> Vec<PathBuf> {
    if !is_pattern(input) {
        return vec![PathBuf::from(input)];
    }

    match glob(input) {
        Ok(paths) => {
            let paths: Vec<PathBuf> = paths.filter_map(|r| r.ok()).filter(|p| p.is_file()).collect();
            if paths.is_empty() {
                errors.push(format!("{}: no matching files", input));
            }
            paths
        }
        Err(e) => {
            errors.push(format!("{}: invalid pattern: {}", input, e));
            Vec::new()
        }
    }
}

fn is_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn write_summary(path: &Path, master: &[ItemRollup]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "item_code",
        "item_name",
        "invoice_count",
        "frequency_per_month",
        "total_quantity",
        "total_value",
        "avg_price",
        "last_invoice_date",
    ])?;

    for item in master {
        wtr.write_record([
            item.item_code.as_str(),
            item.item_name.as_str(),
            &item.invoice_count.to_string(),
            &item.frequency_per_month.to_string(),
            &item.total_quantity.to_string(),
            &item.total_value.to_string(),
            &item.avg_price.to_string(),
            &item
                .last_invoice_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

fn print_summary(report: &IngestReport, start: Instant) {
    eprintln!();
    eprintln!(
        "{} Processed {} PDF files in {:?}",
        style("✓").green(),
        report.files_processed,
        start.elapsed()
    );
    eprintln!(
        "   {} invoices, {} line items, {} items, {} months",
        style(report.invoices.len()).green(),
        style(report.parsed_lines.len()).green(),
        report.master.len(),
        report.monthly.len()
    );

    if !report.duplicates.is_empty() {
        eprintln!(
            "   {} duplicate invoices skipped",
            style(report.duplicates.len()).yellow()
        );
    }

    if !report.errors.is_empty() {
        eprintln!();
        eprintln!("{}", style("Errors:").red());
        for error in &report.errors {
            eprintln!("  - {}", error);
        }
    }
}
