use rusqlite::Connection;

use super::run::refresh_index;
use super::*;
use crate::cli::RefreshMode;
use crate::commands::parse::{MarkdownTableParser, ParseOptions};
use crate::model::Record;
use crate::semantic::resolve_model_config;

const DOC: &str = "\
## Animals
| API | Description | Auth |
|---|---|---|
| [Cat Facts](https://cat.example) | Daily cat facts | No |
| [Dogs](https://dog.example) | Dog pictures | No |

## Weather
| API | Description | Auth |
|---|---|---|
| [Open-Meteo](https://open-meteo.com/) | Global weather forecast API | No |
";

fn memory_db() -> Connection {
    let connection = Connection::open_in_memory().expect("in-memory db");
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .expect("foreign keys");
    ensure_schema(&connection).expect("schema");
    connection
}

fn parse(doc: &str) -> Vec<Record> {
    MarkdownTableParser::new(ParseOptions::default())
        .expect("patterns compile")
        .parse(doc)
}

#[test]
fn refresh_index_stores_records_and_embeddings() {
    let mut connection = memory_db();
    let model = resolve_model_config("");
    ensure_model_entry(&connection, &model).expect("model");
    let records = parse(DOC);
    let mut warnings = Vec::new();

    let counts = refresh_index(
        &mut connection,
        &records,
        &model,
        RefreshMode::MissingOrStale,
        2,
        &mut warnings,
    )
    .expect("refresh");

    assert_eq!(counts.records_total, 3);
    assert_eq!(counts.eligible_records, 3);
    assert_eq!(counts.updated_embeddings, 3);
    assert_eq!(count_records(&connection).expect("count"), 3);
    assert!(warnings.is_empty());

    let index = load_index(&connection, &model.model_id, model.dimensions, None).expect("index");
    assert_eq!(index.ids.len(), 3);
    assert_eq!(index.vectors.len(), 3);
    assert_eq!(index.dimensions(), model.dimensions);

    let stored = load_record(&connection, records[0].id())
        .expect("load")
        .expect("record exists");
    assert_eq!(stored, records[0]);
}

#[test]
fn unchanged_records_are_not_re_embedded() {
    let mut connection = memory_db();
    let model = resolve_model_config("");
    ensure_model_entry(&connection, &model).expect("model");
    let records = parse(DOC);
    let mut warnings = Vec::new();

    refresh_index(&mut connection, &records, &model, RefreshMode::MissingOrStale, 64, &mut warnings)
        .expect("first refresh");
    let second = refresh_index(
        &mut connection,
        &records,
        &model,
        RefreshMode::MissingOrStale,
        64,
        &mut warnings,
    )
    .expect("second refresh");
    assert_eq!(second.stale_rows_before, 0);
    assert_eq!(second.updated_embeddings, 0);

    let full = refresh_index(
        &mut connection,
        &records,
        &model,
        RefreshMode::Full,
        64,
        &mut warnings,
    )
    .expect("full refresh");
    assert_eq!(full.updated_embeddings, 3);
}

#[test]
fn removed_rows_are_pruned_with_their_embeddings() {
    let mut connection = memory_db();
    let model = resolve_model_config("");
    ensure_model_entry(&connection, &model).expect("model");
    let mut warnings = Vec::new();

    refresh_index(
        &mut connection,
        &parse(DOC),
        &model,
        RefreshMode::MissingOrStale,
        64,
        &mut warnings,
    )
    .expect("first refresh");

    let shorter = DOC.replace("| [Dogs](https://dog.example) | Dog pictures | No |\n", "");
    let counts = refresh_index(
        &mut connection,
        &parse(&shorter),
        &model,
        RefreshMode::MissingOrStale,
        64,
        &mut warnings,
    )
    .expect("second refresh");

    assert_eq!(counts.records_pruned, 1);
    assert_eq!(counts.updated_embeddings, 0);
    assert_eq!(count_records(&connection).expect("count"), 2);
    assert_eq!(
        count_embeddings_by_model(&connection).expect("counts"),
        vec![(model.model_id.clone(), 2)]
    );
}

#[test]
fn duplicate_ids_are_indexed_once() {
    let mut connection = memory_db();
    let model = resolve_model_config("");
    ensure_model_entry(&connection, &model).expect("model");
    let doc = "## A\n| API | D |\n|---|---|\n| x | y |\n| x | y |\n";
    let records = parse(doc);
    assert_eq!(records[0].id(), records[1].id());
    let mut warnings = Vec::new();

    let counts = refresh_index(
        &mut connection,
        &records,
        &model,
        RefreshMode::Full,
        64,
        &mut warnings,
    )
    .expect("refresh");

    assert_eq!(counts.records_total, 1);
    assert_eq!(warnings.len(), 1);
}

#[test]
fn category_filter_limits_loaded_index() {
    let mut connection = memory_db();
    let model = resolve_model_config("");
    ensure_model_entry(&connection, &model).expect("model");
    let mut warnings = Vec::new();
    refresh_index(&mut connection, &parse(DOC), &model, RefreshMode::Full, 64, &mut warnings)
        .expect("refresh");

    let weather = load_index(&connection, &model.model_id, model.dimensions, Some("Weather"))
        .expect("index");
    assert_eq!(weather.ids.len(), 1);
}

#[test]
fn status_reports_missing_model_embeddings() {
    let connection = memory_db();
    let status = semantic_index_status(&connection, "unknown").expect("status");
    assert!(!status.available);
    assert!(status.reason.unwrap_or_default().contains("unknown"));
}
