use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::model::Record;
use crate::semantic::{EmbeddingIndex, SemanticModelConfig, decode_embedding_blob};
use crate::util::now_utc_string;

pub const DB_FILE_NAME: &str = "public_apis_index.sqlite";
pub(super) const DB_SCHEMA_VERSION: &str = "0.1.0";

#[derive(Debug, Clone)]
pub(super) struct ExistingEmbeddingRow {
    pub(super) text_hash: String,
    pub(super) embedding_dim: usize,
}

#[derive(Debug, Clone)]
pub(super) struct PendingEmbedding {
    pub(super) record_id: String,
    pub(super) text_hash: String,
    pub(super) blob: Vec<u8>,
}

pub(super) fn open_connection(db_path: &Path) -> Result<Connection> {
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    Ok(connection)
}

pub fn open_read_only_connection(db_path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open index database: {}", db_path.display()))
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign_keys")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
              record_id TEXT PRIMARY KEY,
              category TEXT NOT NULL,
              position INTEGER NOT NULL,
              fields_json TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_category ON records(category);

            CREATE TABLE IF NOT EXISTS embedding_models (
              model_id TEXT PRIMARY KEY,
              backend TEXT NOT NULL,
              dimensions INTEGER NOT NULL,
              normalize INTEGER NOT NULL,
              created_at TEXT NOT NULL,
              config_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS record_embeddings (
              record_id TEXT NOT NULL,
              model_id TEXT NOT NULL,
              embedding BLOB NOT NULL,
              embedding_dim INTEGER NOT NULL,
              text_hash TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              PRIMARY KEY(record_id, model_id),
              FOREIGN KEY(record_id) REFERENCES records(record_id) ON DELETE CASCADE,
              FOREIGN KEY(model_id) REFERENCES embedding_models(model_id)
            );
            ",
        )
        .context("failed to create index schema")?;

    connection.execute(
        "
        INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
        ON CONFLICT(key) DO UPDATE SET value=excluded.value
        ",
        [DB_SCHEMA_VERSION],
    )?;

    Ok(())
}

pub(super) fn ensure_model_entry(
    connection: &Connection,
    model: &SemanticModelConfig,
) -> Result<()> {
    let config_json = serde_json::to_string(model).context("failed to serialize model config")?;

    connection.execute(
        "
        INSERT INTO embedding_models(model_id, backend, dimensions, normalize, created_at, config_json)
        VALUES(?1, ?2, ?3, 1, ?4, ?5)
        ON CONFLICT(model_id) DO UPDATE SET
          backend=excluded.backend,
          dimensions=excluded.dimensions,
          normalize=excluded.normalize,
          config_json=excluded.config_json
        ",
        params![
            model.model_id,
            model.backend,
            model.dimensions as i64,
            now_utc_string(),
            config_json,
        ],
    )?;

    Ok(())
}

/// Upserts by id and records each row's position in the source document.
pub(super) fn upsert_records(connection: &mut Connection, records: &[Record]) -> Result<usize> {
    let updated_at = now_utc_string();
    let tx = connection.transaction()?;
    let mut upserted = 0usize;

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO records(record_id, category, position, fields_json, updated_at)
            VALUES(?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(record_id) DO UPDATE SET
              category=excluded.category,
              position=excluded.position,
              fields_json=excluded.fields_json,
              updated_at=excluded.updated_at
            ",
        )?;

        for (position, record) in records.iter().enumerate() {
            let fields_json = serde_json::to_string(record)
                .with_context(|| format!("failed to serialize record {}", record.id()))?;
            statement.execute(params![
                record.id(),
                record.category(),
                position as i64,
                fields_json,
                updated_at,
            ])?;
            upserted += 1;
        }
    }

    tx.commit()?;
    Ok(upserted)
}

/// Deletes records (and their embeddings) whose ids are not in `keep`.
pub(super) fn prune_missing_records(
    connection: &mut Connection,
    keep: &HashSet<&str>,
) -> Result<usize> {
    let existing = {
        let mut statement = connection.prepare("SELECT record_id FROM records")?;
        let ids = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        ids
    };

    let stale = existing
        .into_iter()
        .filter(|record_id| !keep.contains(record_id.as_str()))
        .collect::<Vec<String>>();
    if stale.is_empty() {
        return Ok(0);
    }

    let tx = connection.transaction()?;
    for record_id in &stale {
        tx.execute(
            "DELETE FROM record_embeddings WHERE record_id = ?1",
            [record_id],
        )?;
        tx.execute("DELETE FROM records WHERE record_id = ?1", [record_id])?;
    }
    tx.commit()?;

    Ok(stale.len())
}

pub(super) fn load_existing_embedding(
    connection: &Connection,
    record_id: &str,
    model_id: &str,
) -> Result<Option<ExistingEmbeddingRow>> {
    let row = connection
        .query_row(
            "
            SELECT text_hash, embedding_dim
            FROM record_embeddings
            WHERE record_id = ?1 AND model_id = ?2
            ",
            params![record_id, model_id],
            |row| {
                Ok(ExistingEmbeddingRow {
                    text_hash: row.get(0)?,
                    embedding_dim: row.get::<_, i64>(1)? as usize,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub(super) fn flush_embed_batch(
    connection: &mut Connection,
    model_id: &str,
    dimensions: usize,
    pending: &mut Vec<PendingEmbedding>,
) -> Result<usize> {
    if pending.is_empty() {
        return Ok(0);
    }

    let updated_at = now_utc_string();
    let tx = connection.transaction()?;
    let mut updated = 0usize;
    for embedding in pending.drain(..) {
        tx.execute(
            "
            INSERT INTO record_embeddings(record_id, model_id, embedding, embedding_dim, text_hash, updated_at)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(record_id, model_id) DO UPDATE SET
              embedding=excluded.embedding,
              embedding_dim=excluded.embedding_dim,
              text_hash=excluded.text_hash,
              updated_at=excluded.updated_at
            ",
            params![
                embedding.record_id,
                model_id,
                embedding.blob,
                dimensions as i64,
                embedding.text_hash,
                updated_at,
            ],
        )?;
        updated += 1;
    }
    tx.commit()?;

    Ok(updated)
}

pub struct SemanticIndexStatus {
    pub available: bool,
    pub reason: Option<String>,
}

pub fn semantic_index_status(
    connection: &Connection,
    model_id: &str,
) -> Result<SemanticIndexStatus> {
    let embeddings_table_exists = connection
        .query_row(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name = 'record_embeddings'
            LIMIT 1
            ",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();

    if !embeddings_table_exists {
        return Ok(SemanticIndexStatus {
            available: false,
            reason: Some("record_embeddings table is missing; run the index command".to_string()),
        });
    }

    let embedding_count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM record_embeddings WHERE model_id = ?1",
        [model_id],
        |row| row.get(0),
    )?;

    if embedding_count <= 0 {
        return Ok(SemanticIndexStatus {
            available: false,
            reason: Some(format!("semantic index is empty for model '{model_id}'")),
        });
    }

    Ok(SemanticIndexStatus {
        available: true,
        reason: None,
    })
}

/// Embeddings for `model_id`, ordered by record id, optionally limited to one category.
pub fn load_index(
    connection: &Connection,
    model_id: &str,
    dimensions: usize,
    category: Option<&str>,
) -> Result<EmbeddingIndex> {
    let mut statement = connection.prepare(
        "
        SELECT e.record_id, e.embedding
        FROM record_embeddings e
        JOIN records r ON r.record_id = e.record_id
        WHERE e.model_id = ?1
          AND e.embedding_dim = ?2
          AND (?3 IS NULL OR r.category = ?3)
        ORDER BY e.record_id ASC
        ",
    )?;

    let mut rows = statement.query(params![model_id, dimensions as i64, category])?;
    let mut ids = Vec::<String>::new();
    let mut vectors = Vec::<Vec<f32>>::new();

    while let Some(row) = rows.next()? {
        let record_id: String = row.get(0)?;
        let blob: Vec<u8> = row.get(1)?;
        let Some(vector) = decode_embedding_blob(&blob, dimensions) else {
            continue;
        };
        ids.push(record_id);
        vectors.push(vector);
    }

    Ok(EmbeddingIndex {
        model_id: model_id.to_string(),
        ids,
        vectors,
    })
}

pub fn load_record(connection: &Connection, record_id: &str) -> Result<Option<Record>> {
    let fields_json = connection
        .query_row(
            "SELECT fields_json FROM records WHERE record_id = ?1",
            [record_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    fields_json
        .map(|raw| {
            serde_json::from_str::<Record>(&raw)
                .with_context(|| format!("failed to decode stored record {record_id}"))
        })
        .transpose()
}

pub fn count_records(connection: &Connection) -> Result<i64> {
    let count = connection.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_embeddings_by_model(connection: &Connection) -> Result<Vec<(String, i64)>> {
    let mut statement = connection.prepare(
        "
        SELECT m.model_id, COUNT(e.record_id)
        FROM embedding_models m
        LEFT JOIN record_embeddings e ON e.model_id = m.model_id
        GROUP BY m.model_id
        ORDER BY m.model_id ASC
        ",
    )?;
    let counts = statement
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;
    Ok(counts)
}
