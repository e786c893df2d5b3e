use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ParseArgs;
use crate::util::{ensure_directory, read_text_input, to_json_with_indent};

use super::{MarkdownTableParser, ParseOptions};

pub fn run(args: ParseArgs) -> Result<()> {
    let markdown = read_text_input(&args.input)?;
    let parser = MarkdownTableParser::new(ParseOptions {
        ignored_headings: args.ignored_headings,
    })?;

    let parsed = parser.parse_document(&markdown);
    let indent = (!args.compact).then_some(args.indent);
    let mut data = to_json_with_indent(&parsed.records, indent)?;
    data.push(b'\n');

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    ensure_directory(parent)?;
                }
            }
            let mut file = File::create(path)
                .with_context(|| format!("failed to create output file: {}", path.display()))?;
            file.write_all(&data)
                .with_context(|| format!("failed to write output file: {}", path.display()))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&data)
                .context("failed to write records to stdout")?;
            stdout.flush()?;
        }
    }

    info!(
        input = %args.input.display(),
        tables = parsed.stats.tables,
        records = parsed.records.len(),
        padded_rows = parsed.stats.padded_rows,
        merged_rows = parsed.stats.merged_rows,
        "markdown tables parsed"
    );

    Ok(())
}
