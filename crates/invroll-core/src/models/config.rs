//! Configuration structures for the ingest pipeline.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Main configuration for the invroll pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvrollConfig {
    /// Visual line reconstruction.
    pub layout: LayoutConfig,

    /// Line-item and header extraction.
    pub extraction: ExtractionConfig,

    /// External reasoning service used for normalization.
    pub delegate: DelegateConfig,

    /// Remote tabular store.
    pub store: StoreConfig,
}

/// Visual line reconstruction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Maximum vertical distance (PDF units) between tokens on one line.
    pub y_tolerance: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { y_tolerance: 1.4 }
    }
}

/// Which extractor produces line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Layout heuristics only.
    #[default]
    Heuristic,
    /// Reasoning service only.
    Delegate,
    /// Heuristics first, reasoning service for documents with no lines.
    Hybrid,
}

/// Line-item and header extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Extraction strategy.
    pub strategy: ExtractionStrategy,

    /// Allowed |qty * unit - total| as a fraction of max(|total|, 1).
    pub tolerance_ratio: f64,

    /// Maximum digits in a quantity token.
    pub max_quantity_digits: usize,

    /// Supplier names recognized by whole-word match.
    pub known_suppliers: Vec<String>,

    /// Fall back to the first long text line as the supplier name.
    pub guess_supplier_from_text: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractionStrategy::Heuristic,
            tolerance_ratio: 0.25,
            max_quantity_digits: 5,
            known_suppliers: vec!["Noble".to_string()],
            guess_supplier_from_text: false,
        }
    }
}

impl ExtractionConfig {
    /// Tolerance ratio as a decimal, falling back to the default for
    /// non-finite values.
    pub fn tolerance(&self) -> Decimal {
        Decimal::from_f64(self.tolerance_ratio).unwrap_or_else(|| Decimal::new(25, 2))
    }
}

/// Granularity of excerpts sent to the reasoning service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcerptGranularity {
    /// One call per page.
    PerPage,
    /// One call per document with concatenated pages.
    #[default]
    PerDocument,
}

/// How page text is windowed into reasoning-service excerpts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcerptPolicy {
    /// Per page or per document.
    pub granularity: ExcerptGranularity,

    /// Maximum characters in one excerpt.
    pub max_chars: usize,

    /// Maximum characters taken from one page.
    pub per_page_chars: usize,

    /// Separator inserted between pages of a document excerpt.
    pub page_break: String,
}

impl Default for ExcerptPolicy {
    fn default() -> Self {
        Self {
            granularity: ExcerptGranularity::PerDocument,
            max_chars: 12_000,
            per_page_chars: 4_000,
            page_break: "\n\n--- page break ---\n\n".to_string(),
        }
    }
}

/// Reasoning service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegateConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,

    /// Model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Excerpt windowing.
    pub excerpt: ExcerptPolicy,

    /// Retries after a rate-limit response.
    pub max_retries: u32,

    /// First backoff delay in milliseconds.
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,

    /// Minimum spacing between outbound calls in milliseconds.
    pub min_interval_ms: u64,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            api_key_env: "LLM_API_KEY".to_string(),
            excerpt: ExcerptPolicy::default(),
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            min_interval_ms: 1_500,
            timeout_secs: 60,
        }
    }
}

/// Remote store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store; overrides `url_env` when set.
    pub url: Option<String>,

    /// Environment variable holding the base URL.
    pub url_env: String,

    /// Environment variable holding the service key.
    pub api_key_env: String,

    /// Table receiving invoice records (upserted on `invoice_number`).
    pub invoices_table: String,

    /// Table receiving parsed lines.
    pub items_table: String,

    /// Rows per write request.
    pub chunk_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            url_env: "STORE_URL".to_string(),
            api_key_env: "STORE_KEY".to_string(),
            invoices_table: "invoices".to_string(),
            items_table: "items".to_string(),
            chunk_size: 500,
        }
    }
}

impl InvrollConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
