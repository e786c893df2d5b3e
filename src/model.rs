use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const UNCATEGORIZED: &str = "Uncategorized";

/// One extracted table row: header-derived fields plus `id` and `category`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later inserts under the same name replace earlier values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn id(&self) -> &str {
        self.get("id").unwrap_or_default()
    }

    pub fn category(&self) -> &str {
        self.get("category").unwrap_or(UNCATEGORIZED)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexCounts {
    pub records_total: usize,
    pub records_upserted: usize,
    pub records_pruned: usize,
    pub eligible_records: usize,
    pub skipped_empty_records: usize,
    pub stale_rows_before: usize,
    pub updated_embeddings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub source: String,
    pub db_path: String,
    pub model_id: String,
    pub embedding_dim: usize,
    pub backend: String,
    pub db_schema_version: String,
    pub refresh_mode: String,
    pub batch_size: usize,
    pub counts: IndexCounts,
    pub duration_ms: u128,
    pub status: String,
    pub warnings: Vec<String>,
}
