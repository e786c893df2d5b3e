use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::model::{Record, UNCATEGORIZED};

use super::{
    InlineMarkup, RowShape, is_alignment_row, slugify_header, split_document_lines,
};

/// Heading label of a promotional section that should not become a category.
pub const DEFAULT_IGNORED_HEADING: &str = "APILayer APIs";

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub ignored_headings: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            ignored_headings: vec![DEFAULT_IGNORED_HEADING.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableScanStats {
    pub tables: usize,
    pub rows: usize,
    pub padded_rows: usize,
    pub merged_rows: usize,
    pub stray_alignment_rows: usize,
    pub ignored_headings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub records: Vec<Record>,
    pub stats: TableScanStats,
}

#[derive(Debug)]
pub struct MarkdownTableParser {
    pub(super) markup: InlineMarkup,
    category_heading: Regex,
    table_breaking_heading: Regex,
    ignored_headings: HashSet<String>,
}

enum ScanState {
    Scanning,
    InTable { headers: Vec<String> },
}

impl MarkdownTableParser {
    pub fn new(options: ParseOptions) -> Result<Self> {
        Ok(Self {
            markup: InlineMarkup {
                link: Regex::new(r"\[([^\]]+)\]\(([^)]+)\)")
                    .context("failed to compile inline link regex")?,
                html_tag: Regex::new(r"<[^>]+>").context("failed to compile html tag regex")?,
                html_comment: Regex::new(r"<!--.*?-->")
                    .context("failed to compile html comment regex")?,
            },
            category_heading: Regex::new(r"^(#{2,6})\s+(.+?)\s*$")
                .context("failed to compile category heading regex")?,
            table_breaking_heading: Regex::new(r"^\s*#{1,6}\s+")
                .context("failed to compile table-breaking heading regex")?,
            ignored_headings: options.ignored_headings.into_iter().collect(),
        })
    }

    pub fn parse(&self, text: &str) -> Vec<Record> {
        self.parse_document(text).records
    }

    pub fn parse_document(&self, text: &str) -> ParsedDocument {
        let lines = split_document_lines(text);
        let mut records = Vec::<Record>::new();
        let mut stats = TableScanStats::default();
        let mut category: Option<String> = None;
        let mut state = ScanState::Scanning;
        let mut index = 0usize;

        while index < lines.len() {
            let line = lines[index];

            match &state {
                ScanState::Scanning => {
                    if let Some(heading) = self.heading_text(line) {
                        if self.ignored_headings.contains(&heading) {
                            stats.ignored_headings += 1;
                            debug!(heading = %heading, "ignored heading");
                        } else {
                            category = Some(heading);
                        }
                        index += 1;
                        continue;
                    }

                    let starts_table = lines
                        .get(index + 1)
                        .map(|next| is_alignment_row(next))
                        .unwrap_or(false);
                    if starts_table {
                        let (header_cells, _) = self.markup.split_row(line, None);
                        let headers = header_cells
                            .iter()
                            .map(|cell| slugify_header(cell))
                            .collect::<Vec<String>>();
                        debug!(
                            line = index + 1,
                            columns = headers.len(),
                            category = category.as_deref().unwrap_or(UNCATEGORIZED),
                            "table detected"
                        );
                        stats.tables += 1;
                        state = ScanState::InTable { headers };
                        index += 2;
                        continue;
                    }

                    index += 1;
                }
                ScanState::InTable { headers } => {
                    if line.trim().is_empty() || self.table_breaking_heading.is_match(line) {
                        state = ScanState::Scanning;
                        continue;
                    }

                    if is_alignment_row(line) {
                        stats.stray_alignment_rows += 1;
                        index += 1;
                        continue;
                    }

                    if !line.contains('|') {
                        state = ScanState::Scanning;
                        continue;
                    }

                    let (cells, shape) = self.markup.split_row(line, Some(headers.len()));
                    match shape {
                        RowShape::Exact => {}
                        RowShape::Padded => stats.padded_rows += 1,
                        RowShape::Merged => stats.merged_rows += 1,
                    }

                    records.push(self.build_record(headers, &cells, category.as_deref()));
                    stats.rows += 1;
                    index += 1;
                }
            }
        }

        debug!(
            tables = stats.tables,
            rows = stats.rows,
            padded_rows = stats.padded_rows,
            merged_rows = stats.merged_rows,
            stray_alignment_rows = stats.stray_alignment_rows,
            ignored_headings = stats.ignored_headings,
            "document scanned"
        );

        ParsedDocument { records, stats }
    }

    /// Category text of an H2-H6 heading line, with links and tags removed.
    fn heading_text(&self, line: &str) -> Option<String> {
        let captures = self.category_heading.captures(line.trim())?;
        let raw = captures.get(2)?.as_str();
        let text = self.markup.unwrap_links(raw);
        Some(self.markup.strip_html(&text).trim().to_string())
    }

    fn build_record(&self, headers: &[String], cells: &[String], category: Option<&str>) -> Record {
        let mut record = Record::new();
        for (header, cell) in headers.iter().zip(cells) {
            let (text, href) = self.markup.extract_cell(cell);
            record.insert(header.as_str(), text);
            if let Some(href) = href {
                record.insert(format!("{header}_link"), href);
            }
        }

        let category = category.unwrap_or_default();
        let id = stable_record_id(
            category,
            record.get("api").unwrap_or_default(),
            record.get("api_link").unwrap_or_default(),
            cells,
        );
        record.insert("id", id);
        record.insert(
            "category",
            if category.is_empty() {
                UNCATEGORIZED
            } else {
                category
            },
        );
        record
    }
}

/// UUIDv5 (URL namespace) over `category|api|api_link|cell1||cell2||...`.
pub(super) fn stable_record_id(
    category: &str,
    api: &str,
    api_link: &str,
    cells: &[String],
) -> String {
    let key = format!("{category}|{api}|{api_link}|{}", cells.join("||"));
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}
