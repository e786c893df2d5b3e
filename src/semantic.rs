use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::Record;

pub const DEFAULT_MODEL_ID: &str = "hash-bow-384-v1";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_NORMALIZATION: &str = "l2";
pub const DEFAULT_BACKEND: &str = "local-hash-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticModelConfig {
    pub model_id: String,
    pub dimensions: usize,
    pub normalization: String,
    pub backend: String,
}

pub fn resolve_model_config(model_id: &str) -> SemanticModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() {
        DEFAULT_MODEL_ID
    } else {
        trimmed
    };

    SemanticModelConfig {
        model_id: resolved_id.to_string(),
        dimensions: DEFAULT_EMBEDDING_DIM,
        normalization: DEFAULT_NORMALIZATION.to_string(),
        backend: DEFAULT_BACKEND.to_string(),
    }
}

/// Ids with one embedding row each, all of the model's dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingIndex {
    pub model_id: String,
    pub ids: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

impl EmbeddingIndex {
    pub fn dimensions(&self) -> usize {
        self.vectors.first().map(Vec::len).unwrap_or(0)
    }
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Category line followed by the record's descriptive field values.
pub fn record_payload_for_embedding(record: &Record) -> Option<String> {
    let body = record
        .iter()
        .filter(|(name, _)| !matches!(*name, "id" | "category") && !name.ends_with("_link"))
        .map(|(_, value)| normalize_whitespace(value))
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>();

    if body.is_empty() {
        return None;
    }

    let category = normalize_whitespace(record.category());
    if category.is_empty() {
        Some(body.join("\n"))
    } else {
        Some(format!("{category}\n{}", body.join("\n")))
    }
}

pub fn embedding_text_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn embed_text_local(payload: &str, dimensions: usize) -> Vec<f32> {
    let dims = dimensions.max(8);
    let mut vector = vec![0_f32; dims];
    let tokens = tokenize_payload(payload);

    for token in &tokens {
        let hash = stable_hash(token);
        let index = (hash as usize) % dims;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
        vector[index] += sign * weight;
    }

    normalize_vector(&mut vector);
    vector
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    left.iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| f64::from(*left_value) * f64::from(*right_value))
        .sum::<f64>()
}

pub fn encode_embedding_blob(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_embedding_blob(blob: &[u8], expected_dim: usize) -> Option<Vec<f32>> {
    if expected_dim == 0 || blob.len() != expected_dim.saturating_mul(4) {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

// SipHash with fixed keys: stable across runs of the same build.
fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn tokenize_payload(payload: &str) -> Vec<String> {
    let words = normalize_whitespace(payload)
        .split(' ')
        .map(|value| {
            value
                .chars()
                .filter(|character| character.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>();

    let mut features = Vec::<String>::with_capacity(words.len() * 2);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    for value in values {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        let mut record = Record::new();
        for (name, value) in pairs {
            record.insert(*name, *value);
        }
        record
    }

    #[test]
    fn payload_skips_ids_links_and_empty_values() {
        let record = record(&[
            ("api", "Cat Facts"),
            ("api_link", "https://cat.example"),
            ("description", "  Daily   cat facts "),
            ("cors", ""),
            ("id", "abc"),
            ("category", "Animals"),
        ]);

        assert_eq!(
            record_payload_for_embedding(&record).as_deref(),
            Some("Animals\nCat Facts\nDaily cat facts")
        );
    }

    #[test]
    fn payload_is_none_without_descriptive_fields() {
        let record = record(&[("id", "abc"), ("category", "Animals"), ("api", " ")]);
        assert_eq!(record_payload_for_embedding(&record), None);
    }

    #[test]
    fn embeddings_are_normalized_and_deterministic() {
        let first = embed_text_local("weather forecast api", DEFAULT_EMBEDDING_DIM);
        let second = embed_text_local("weather forecast api", DEFAULT_EMBEDDING_DIM);
        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_EMBEDDING_DIM);
        assert!((cosine_similarity(&first, &first) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_payload_embeds_to_zero_vector() {
        let vector = embed_text_local("  !!  ", 16);
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn blob_decoding_rejects_wrong_dimension() {
        let blob = encode_embedding_blob(&[1.0, -2.5, 0.25]);
        assert_eq!(decode_embedding_blob(&blob, 3), Some(vec![1.0, -2.5, 0.25]));
        assert_eq!(decode_embedding_blob(&blob, 4), None);
    }
}
