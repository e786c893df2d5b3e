use regex::Regex;

const FALLBACK_HEADER: &str = "col";

/// How a data row's cell count compared to the header set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RowShape {
    Exact,
    Padded,
    Merged,
}

/// Normalizes a header cell into a field name; never returns an empty token.
pub(super) fn slugify_header(raw: &str) -> String {
    let spaced = raw.replace('`', "").replace('&', " and ");
    let lowered = collapse_whitespace(&spaced).to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_HEADER.to_string()
    } else {
        trimmed.to_string()
    }
}

pub(super) fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Splits on `\n`, `\r\n`, lone `\r` and the other Unicode line boundaries
/// (`\x0b`, `\x0c`, `\x1c`..`\x1e`, NEL, U+2028, U+2029). A trailing break adds no empty line.
pub(super) fn split_document_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::<&str>::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        if !is_line_boundary(ch) {
            continue;
        }

        lines.push(&text[start..offset]);
        start = offset + ch.len_utf8();
        if ch == '\r' && chars.peek().map(|(_, next)| *next == '\n').unwrap_or(false) {
            chars.next();
            start += 1;
        }
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn is_line_boundary(ch: char) -> bool {
    matches!(
        ch,
        '\n'
            | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// `|:---|:---:|---:|` style separator between a header and its data rows.
pub(super) fn is_alignment_row(line: &str) -> bool {
    let line = line.trim();
    if !line.contains('|') {
        return false;
    }

    let parts = line
        .trim_matches('|')
        .trim()
        .split('|')
        .map(str::trim)
        .collect::<Vec<&str>>();
    parts.len() >= 2 && parts.iter().all(|part| is_alignment_cell(part))
}

fn is_alignment_cell(cell: &str) -> bool {
    let body = cell.strip_prefix(':').unwrap_or(cell);
    let body = body.strip_suffix(':').unwrap_or(body);
    body.len() >= 3 && body.bytes().all(|byte| byte == b'-')
}

/// Splits a table line into trimmed cells without width reconciliation.
pub(super) fn split_raw_cells(line: &str) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Pads short rows with empty cells; folds overflow into the last cell so no text is dropped.
pub(super) fn reconcile_row_width(
    mut cells: Vec<String>,
    expected: usize,
) -> (Vec<String>, RowShape) {
    if expected == 0 || cells.len() == expected {
        return (cells, RowShape::Exact);
    }

    if cells.len() < expected {
        cells.resize(expected, String::new());
        return (cells, RowShape::Padded);
    }

    let overflow = cells.split_off(expected - 1);
    cells.push(overflow.join(" | "));
    (cells, RowShape::Merged)
}

/// Compiled inline-markup patterns shared by cell and heading extraction.
#[derive(Debug)]
pub(super) struct InlineMarkup {
    pub(super) link: Regex,
    pub(super) html_tag: Regex,
    pub(super) html_comment: Regex,
}

impl InlineMarkup {
    /// Display text with links reduced to their labels, plus the first link's href.
    pub(super) fn extract_cell(&self, cell: &str) -> (String, Option<String>) {
        let href = self
            .link
            .captures(cell)
            .and_then(|captures| captures.get(2))
            .map(|url| url.as_str().trim().to_string())
            .filter(|url| !url.is_empty());

        let text = self.unwrap_links(cell);
        let text = self.strip_html(&text).replace('`', "");
        (collapse_whitespace(&text), href)
    }

    pub(super) fn unwrap_links(&self, text: &str) -> String {
        self.link.replace_all(text, "$1").into_owned()
    }

    pub(super) fn strip_html(&self, text: &str) -> String {
        self.html_tag.replace_all(text, "").into_owned()
    }

    pub(super) fn strip_comments(&self, line: &str) -> String {
        self.html_comment.replace_all(line, "").into_owned()
    }

    /// Comment-free cells reconciled against `expected` when a width is known.
    pub(super) fn split_row(&self, line: &str, expected: Option<usize>) -> (Vec<String>, RowShape) {
        let cells = split_raw_cells(&self.strip_comments(line));
        match expected {
            Some(expected) => reconcile_row_width(cells, expected),
            None => (cells, RowShape::Exact),
        }
    }
}
