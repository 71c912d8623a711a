// src/storage/table.rs

//! Headered, comma-delimited tables.
//!
//! Fields containing a delimiter, quote or line break are quoted with
//! doubled inner quotes on write. Reading is line-oriented: a quoted field
//! may contain commas and quotes but not line breaks.

/// Field delimiter.
const DELIMITER: char = ',';

/// A parsed table: the first line is always the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse table text. Blank lines are ignored.
    pub fn parse(content: &str) -> Self {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut lines = content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty());

        let header = lines.next().map(parse_row);
        let rows = lines.map(parse_row).collect();
        Self { header, rows }
    }

    /// Index of a header column, compared case-insensitively.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header
            .as_ref()?
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }
}

/// Non-empty, trimmed field at `column`, or `None` for a malformed row.
pub fn field(row: &[String], column: usize) -> Option<&str> {
    row.get(column).map(|f| f.trim()).filter(|f| !f.is_empty())
}

/// Encode one row, without the trailing newline.
pub fn encode_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| encode_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

fn encode_field(field: &str) -> String {
    if field.contains([DELIMITER, '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parse one line into fields.
pub fn parse_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            c if c == DELIMITER && !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}
