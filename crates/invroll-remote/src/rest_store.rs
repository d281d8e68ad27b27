//! PostgREST-compatible record store.

use std::time::Duration;

use async_trait::async_trait;
use invroll_core::error::StoreError;
use invroll_core::models::config::StoreConfig;
use invroll_core::models::invoice::{InvoiceRecord, ParsedLine};
use invroll_core::RecordStore;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";
const INSERT_PREFER: &str = "return=minimal";

/// Record store speaking the PostgREST dialect (`/rest/v1/<table>`).
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build from config: the URL comes from `config.url` or the variable
    /// named by `url_env`, the key from the variable named by `api_key_env`.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .clone()
            .or_else(|| env_value(&config.url_env))
            .ok_or_else(|| {
                StoreError::NotConfigured(format!("no store URL ({} is not set)", config.url_env))
            })?;
        let key = env_value(&config.api_key_env).ok_or_else(|| {
            StoreError::NotConfigured(format!("{} is not set", config.api_key_env))
        })?;
        Self::new(&url, key)
    }

    fn table_url(&self, table: &str, on_conflict: Option<&str>) -> String {
        match on_conflict {
            Some(column) => format!("{}/rest/v1/{}?on_conflict={}", self.base_url, table, column),
            None => format!("{}/rest/v1/{}", self.base_url, table),
        }
    }

    async fn post<T: Serialize + Sync>(
        &self,
        table: &str,
        url: String,
        prefer: &str,
        rows: &[T],
    ) -> Result<(), StoreError> {
        debug!("POST {} ({} rows)", url, rows.len());

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", prefer)
            .json(rows)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            table: table.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn upsert_invoices(&self, table: &str, rows: &[InvoiceRecord]) -> Result<(), StoreError> {
        let url = self.table_url(table, Some("invoice_number"));
        self.post(table, url, UPSERT_PREFER, rows).await
    }

    async fn insert_items(&self, table: &str, rows: &[ParsedLine]) -> Result<(), StoreError> {
        let url = self.table_url(table, None);
        self.post(table, url, INSERT_PREFER, rows).await
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
