use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Reads a UTF-8 document from `path`, or from stdin when `path` is `-`.
pub fn read_text_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .lock()
            .read_to_string(&mut text)
            .context("failed to read document from stdin")?;
        return Ok(text);
    }

    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Serializes `value` with `indent` spaces per level, or on one line when `indent` is `None`.
/// Zero still breaks lines between elements, only without leading spaces.
pub fn to_json_with_indent<T: Serialize>(value: &T, indent: Option<usize>) -> Result<Vec<u8>> {
    let Some(indent) = indent else {
        return serde_json::to_vec(value).context("failed to serialize json");
    };

    let indent_bytes = vec![b' '; indent];
    let mut out = Vec::<u8>::new();
    let mut serializer =
        Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent_bytes));
    value
        .serialize(&mut serializer)
        .context("failed to serialize json")?;
    Ok(out)
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_indent_controls_layout() {
        let value = serde_json::json!({ "a": [1] });
        let compact = to_json_with_indent(&value, None).expect("compact");
        assert_eq!(String::from_utf8(compact).expect("utf8"), r#"{"a":[1]}"#);

        let flat = to_json_with_indent(&value, Some(0)).expect("zero indent");
        assert_eq!(
            String::from_utf8(flat).expect("utf8"),
            "{\n\"a\": [\n1\n]\n}"
        );

        let wide = to_json_with_indent(&value, Some(4)).expect("indented");
        assert_eq!(
            String::from_utf8(wide).expect("utf8"),
            "{\n    \"a\": [\n        1\n    ]\n}"
        );
    }

    #[test]
    fn read_text_input_reads_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("apis.md");
        fs::write(&path, "## Animals\n").expect("write");
        assert_eq!(read_text_input(&path).expect("read"), "## Animals\n");
    }

    #[test]
    fn read_text_input_reports_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_text_input(&dir.path().join("missing.md")).expect_err("missing file");
        assert!(err.to_string().contains("missing.md"));
    }
}
