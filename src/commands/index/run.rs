use std::collections::HashSet;
use std::fs;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::{IndexArgs, RefreshMode};
use crate::commands::parse::{MarkdownTableParser, ParseOptions};
use crate::model::{IndexCounts, IndexRunManifest, Record};
use crate::semantic::{
    SemanticModelConfig, embed_text_local, embedding_text_hash, encode_embedding_blob,
    record_payload_for_embedding, resolve_model_config,
};
use crate::util::{
    ensure_directory, now_utc_string, read_text_input, utc_compact_string, write_json_pretty,
};

use super::*;

pub fn run(args: IndexArgs) -> Result<()> {
    let started = Instant::now();
    let started_ts = Utc::now();
    let run_id = format!("index-{}", utc_compact_string(started_ts));
    let model = resolve_model_config(&args.model_id);

    let (records, source) = load_records(&args)?;
    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join(DB_FILE_NAME));

    info!(source = %source, records = records.len(), run_id = %run_id, "starting index refresh");

    let mut connection = open_connection(&db_path)?;
    ensure_schema(&connection)?;
    ensure_model_entry(&connection, &model)?;

    let mut warnings = Vec::<String>::new();
    let counts = refresh_index(
        &mut connection,
        &records,
        &model,
        args.refresh_mode,
        args.batch_size,
        &mut warnings,
    )?;

    let manifest = IndexRunManifest {
        manifest_version: 1,
        run_id,
        generated_at: now_utc_string(),
        source,
        db_path: db_path.display().to_string(),
        model_id: model.model_id.clone(),
        embedding_dim: model.dimensions,
        backend: model.backend.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        refresh_mode: args.refresh_mode.as_str().to_string(),
        batch_size: args.batch_size.max(1),
        counts,
        duration_ms: started.elapsed().as_millis(),
        status: "completed".to_string(),
        warnings,
    };

    let manifest_path =
        manifest_dir.join(format!("index_run_{}.json", utc_compact_string(started_ts)));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        model_id = %model.model_id,
        records = manifest.counts.records_total,
        updated_embeddings = manifest.counts.updated_embeddings,
        pruned = manifest.counts.records_pruned,
        "index refresh completed"
    );

    Ok(())
}

fn load_records(args: &IndexArgs) -> Result<(Vec<Record>, String)> {
    if let Some(input) = &args.input {
        let markdown = read_text_input(input)?;
        let parser = MarkdownTableParser::new(ParseOptions {
            ignored_headings: args.ignored_headings.clone(),
        })?;
        return Ok((parser.parse(&markdown), input.display().to_string()));
    }

    let Some(path) = &args.records else {
        bail!("either --input or --records is required");
    };
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let records = serde_json::from_slice::<Vec<Record>>(&raw)
        .with_context(|| format!("failed to parse records from {}", path.display()))?;
    Ok((records, path.display().to_string()))
}

/// Mirrors `records` into the database and refreshes embeddings for `model`.
pub(super) fn refresh_index(
    connection: &mut Connection,
    records: &[Record],
    model: &SemanticModelConfig,
    refresh_mode: RefreshMode,
    batch_size: usize,
    warnings: &mut Vec<String>,
) -> Result<IndexCounts> {
    let batch_size = batch_size.max(1);

    let mut seen = HashSet::<&str>::new();
    let mut unique = Vec::<Record>::with_capacity(records.len());
    let mut missing_ids = 0usize;
    for record in records {
        if record.id().is_empty() {
            missing_ids += 1;
            continue;
        }
        if !seen.insert(record.id()) {
            warn!(record_id = %record.id(), "duplicate record id; keeping first occurrence");
            warnings.push(format!("duplicate record id {}", record.id()));
            continue;
        }
        unique.push(record.clone());
    }
    if missing_ids > 0 {
        warnings.push(format!("{missing_ids} records without an id were skipped"));
    }

    let records_upserted = upsert_records(connection, &unique)?;
    let records_pruned = prune_missing_records(connection, &seen)?;

    let mut eligible_records = 0usize;
    let mut skipped_empty_records = 0usize;
    let mut stale_rows_before = 0usize;
    let mut updated_embeddings = 0usize;
    let mut pending = Vec::<PendingEmbedding>::new();

    for record in &unique {
        let Some(payload) = record_payload_for_embedding(record) else {
            skipped_empty_records += 1;
            continue;
        };
        eligible_records += 1;

        let text_hash = embedding_text_hash(&payload);
        let existing = load_existing_embedding(connection, record.id(), &model.model_id)?;
        let stale = existing
            .as_ref()
            .map(|value| value.text_hash != text_hash || value.embedding_dim != model.dimensions)
            .unwrap_or(true);
        if stale {
            stale_rows_before += 1;
        }

        let should_update = match refresh_mode {
            RefreshMode::Full => true,
            RefreshMode::MissingOrStale => stale,
        };
        if !should_update {
            continue;
        }

        let embedding = embed_text_local(&payload, model.dimensions);
        pending.push(PendingEmbedding {
            record_id: record.id().to_string(),
            text_hash,
            blob: encode_embedding_blob(&embedding),
        });

        if pending.len() >= batch_size {
            updated_embeddings +=
                flush_embed_batch(connection, &model.model_id, model.dimensions, &mut pending)?;
            info!(
                model_id = %model.model_id,
                updated_embeddings,
                eligible_records,
                "embed batch committed"
            );
        }
    }

    updated_embeddings +=
        flush_embed_batch(connection, &model.model_id, model.dimensions, &mut pending)?;

    if eligible_records == 0 {
        warnings.push("no records produced an embedding payload".to_string());
    }

    Ok(IndexCounts {
        records_total: unique.len(),
        records_upserted,
        records_pruned,
        eligible_records,
        skipped_empty_records,
        stale_rows_before,
        updated_embeddings,
    })
}
