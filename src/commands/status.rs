use std::fs;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::index::{
    DB_FILE_NAME, count_embeddings_by_model, count_records, open_read_only_connection,
};

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join(DB_FILE_NAME));

    info!(cache_root = %args.cache_root.display(), "status requested");

    match latest_index_manifest(&manifest_dir) {
        Some(name) => info!(manifest = %name, "latest index run manifest"),
        None => warn!(path = %manifest_dir.display(), "no index run manifests found"),
    }

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let connection = open_read_only_connection(&db_path)?;
    let records = count_records(&connection).unwrap_or(0);
    info!(path = %db_path.display(), records, "database status");

    for (model_id, embeddings) in count_embeddings_by_model(&connection)? {
        info!(model_id = %model_id, embeddings, records, "embedding coverage");
    }

    Ok(())
}

/// Manifest names embed a compact UTC timestamp, so the lexical maximum is the newest.
fn latest_index_manifest(manifest_dir: &std::path::Path) -> Option<String> {
    fs::read_dir(manifest_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("index_run_") && name.ends_with(".json"))
        .max()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn latest_manifest_is_the_newest_timestamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "index_run_20260101T000000Z.json",
            "index_run_20261018T120000Z.json",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "{}").expect("write manifest");
        }

        assert_eq!(
            latest_index_manifest(dir.path()).as_deref(),
            Some("index_run_20261018T120000Z.json")
        );
    }

    #[test]
    fn missing_manifest_dir_yields_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(latest_index_manifest(&dir.path().join("absent")), None);
    }
}
