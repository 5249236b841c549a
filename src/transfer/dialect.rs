//! Tokenizers that turn a CSV text blob into numbered rows of cells.

use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// How CSV text is split into cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvDialect {
    /// RFC 4180 parsing: quoted fields may contain commas, quotes and
    /// newlines.
    #[default]
    Standard,
    /// Split on newlines and commas, strip one layer of surrounding quotes.
    /// Embedded commas are not supported.
    Legacy,
}

impl std::fmt::Display for CsvDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CsvDialect::Standard => write!(f, "standard"),
            CsvDialect::Legacy => write!(f, "legacy"),
        }
    }
}

impl std::str::FromStr for CsvDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "rfc4180" => Ok(CsvDialect::Standard),
            "legacy" | "simple" => Ok(CsvDialect::Legacy),
            _ => Err(format!("Invalid CSV dialect: {}", s)),
        }
    }
}

/// A non-blank line of cells with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: usize,
    pub cells: Vec<String>,
}

/// Split text into rows, dropping blank lines.
pub fn tokenize(text: &str, dialect: CsvDialect) -> Result<Vec<RawRow>, ImportError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    match dialect {
        CsvDialect::Standard => tokenize_standard(text),
        CsvDialect::Legacy => Ok(tokenize_legacy(text)),
    }
}

fn tokenize_standard(text: &str) -> Result<Vec<RawRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| ImportError::Malformed(e.to_string()))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(RawRow { line, cells });
    }
    Ok(rows)
}

fn tokenize_legacy(text: &str) -> Vec<RawRow> {
    text.split('\n')
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(line, content)| RawRow {
            line,
            cells: content.split(',').map(strip_quotes).collect(),
        })
        .collect()
}

/// Trim a cell and remove one layer of surrounding double quotes.
fn strip_quotes(cell: &str) -> String {
    let cell = cell.trim();
    cell.strip_prefix('"')
        .and_then(|c| c.strip_suffix('"'))
        .unwrap_or(cell)
        .to_string()
}
