use std::cmp::Ordering;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::SearchArgs;
use crate::commands::index::{
    DB_FILE_NAME, load_index, load_record, open_read_only_connection, semantic_index_status,
};
use crate::model::Record;
use crate::semantic::{EmbeddingIndex, cosine_similarity, embed_text_local, resolve_model_config};

#[derive(Debug, Serialize)]
struct SearchHit {
    rank: usize,
    score: f64,
    record: Record,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    query: String,
    model_id: String,
    category_filter: Option<String>,
    limit: usize,
    returned: usize,
    results: Vec<SearchHit>,
}

pub fn run(args: SearchArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join(DB_FILE_NAME));
    if !db_path.exists() {
        bail!(
            "index database not found at {}; run the index command first",
            db_path.display()
        );
    }

    let model = resolve_model_config(&args.model_id);
    let connection = open_read_only_connection(&db_path)?;
    let status = semantic_index_status(&connection, &model.model_id)?;
    if !status.available {
        bail!(
            "semantic index unavailable: {}",
            status.reason.unwrap_or_default()
        );
    }

    let index = load_index(
        &connection,
        &model.model_id,
        model.dimensions,
        args.category.as_deref(),
    )?;
    let query_vector = embed_text_local(&args.query, model.dimensions);
    let ranked = rank_by_similarity(&index, &query_vector, args.limit);

    let mut results = Vec::with_capacity(ranked.len());
    for (position, (record_id, score)) in ranked.into_iter().enumerate() {
        let Some(record) = load_record(&connection, &record_id)? else {
            continue;
        };
        results.push(SearchHit {
            rank: position + 1,
            score,
            record,
        });
    }

    info!(
        query = %args.query,
        candidates = index.ids.len(),
        dimensions = index.dimensions(),
        returned = results.len(),
        "search completed"
    );

    let response = SearchResponse {
        query: args.query,
        model_id: model.model_id,
        category_filter: args.category,
        limit: args.limit,
        returned: results.len(),
        results,
    };

    if args.json {
        write_json_response(&response)
    } else {
        write_text_response(&response)
    }
}

/// Top `limit` ids by cosine score; ties break on id so output is stable.
fn rank_by_similarity(index: &EmbeddingIndex, query: &[f32], limit: usize) -> Vec<(String, f64)> {
    let mut scored = index
        .ids
        .iter()
        .zip(&index.vectors)
        .map(|(record_id, vector)| (record_id.clone(), cosine_similarity(query, vector)))
        .collect::<Vec<(String, f64)>>();

    scored.sort_by(|left, right| {
        right
            .1
            .partial_cmp(&left.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| left.0.cmp(&right.0))
    });
    scored.truncate(limit);
    scored
}

fn write_json_response(response: &SearchResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, response)
        .context("failed to serialize search json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(response: &SearchResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {}", response.query)?;
    writeln!(
        output,
        "Model: {} category={} returned={}",
        response.model_id,
        response.category_filter.as_deref().unwrap_or("*"),
        response.returned
    )?;

    for hit in &response.results {
        let record = &hit.record;
        let title = record
            .get("api")
            .or_else(|| record.get("name"))
            .unwrap_or(record.id());
        writeln!(
            output,
            "{}. [{:.4}] {} ({})",
            hit.rank,
            hit.score,
            title,
            record.category()
        )?;
        if let Some(description) = record.get("description").filter(|value| !value.is_empty()) {
            writeln!(output, "   {description}")?;
        }
        if let Some(link) = record.get("api_link") {
            writeln!(output, "   {link}")?;
        }
    }

    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_orders_by_score_then_id() {
        let index = EmbeddingIndex {
            model_id: "m".to_string(),
            ids: vec!["b".to_string(), "a".to_string(), "c".to_string()],
            vectors: vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        };

        let ranked = rank_by_similarity(&index, &[1.0, 0.0], 2);
        assert_eq!(
            ranked,
            vec![("a".to_string(), 1.0), ("b".to_string(), 1.0)]
        );
    }

    #[test]
    fn related_text_outranks_unrelated_text() {
        let dims = 384;
        let index = EmbeddingIndex {
            model_id: "m".to_string(),
            ids: vec!["weather".to_string(), "cats".to_string()],
            vectors: vec![
                embed_text_local("Weather\nOpen-Meteo\nGlobal weather forecast API", dims),
                embed_text_local("Animals\nCat Facts\nDaily cat facts", dims),
            ],
        };

        let query = embed_text_local("weather forecast", dims);
        let ranked = rank_by_similarity(&index, &query, 10);
        assert_eq!(ranked[0].0, "weather");
    }
}
