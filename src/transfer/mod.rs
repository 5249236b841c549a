//! CSV and JSON import/export of collections.
//!
//! The adapter only deals in text blobs: reading files and offering
//! downloads is left to the caller.

mod dialect;

pub use dialect::{tokenize, CsvDialect, RawRow};

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entity::{parse_date, Record};
use crate::error::{ImportError, Result, TrackbookError};

/// What happens to a row that does not fit the expected shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPolicy {
    /// Abort the whole import on the first bad row; nothing is committed.
    Strict,
    /// Substitute defaults for missing or unparseable cells.
    Lenient,
}

impl std::fmt::Display for ImportPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportPolicy::Strict => write!(f, "strict"),
            ImportPolicy::Lenient => write!(f, "lenient"),
        }
    }
}

impl FromStr for ImportPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(ImportPolicy::Strict),
            "lenient" => Ok(ImportPolicy::Lenient),
            _ => Err(format!("Invalid import policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Csv,
    Json,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Csv => write!(f, "csv"),
            Format::Json => write!(f, "json"),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            _ => Err(format!("Invalid format: {}", s)),
        }
    }
}

/// Records with a tabular CSV shape.
pub trait CsvRecord: Record {
    /// Header names, in export order.
    const COLUMNS: &'static [&'static str];
    /// Columns a strict import refuses to run without.
    const REQUIRED: &'static [&'static str];

    /// Cells in `COLUMNS` order.
    fn to_row(&self) -> Vec<String>;

    /// Build a record from an import row. The id is assigned on insert.
    fn from_row(row: &Row<'_>) -> std::result::Result<Self, ImportError>;
}

/// One data row of an import, addressed by header name.
pub struct Row<'a> {
    line: usize,
    headers: &'a [String],
    cells: &'a [String],
    policy: ImportPolicy,
}

impl<'a> Row<'a> {
    pub fn new(line: usize, headers: &'a [String], cells: &'a [String], policy: ImportPolicy) -> Self {
        Self {
            line,
            headers,
            cells,
            policy,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn policy(&self) -> ImportPolicy {
        self.policy
    }

    /// Cell under `column` as written, `None` when the column is absent or
    /// the cell blank.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.headers.iter().position(|h| h == column)?;
        self.cells
            .get(index)
            .map(String::as_str)
            .filter(|c| !c.trim().is_empty())
    }

    /// Cell under `column` with surrounding whitespace removed, for values
    /// that are parsed rather than stored.
    fn trimmed(&self, column: &str) -> Option<&'a str> {
        self.get(column).map(str::trim)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).map(str::to_string)
    }

    /// A value the record cannot do without. Strict imports fail on a
    /// blank cell; lenient imports use `fallback`.
    pub fn required(&self, column: &str, fallback: &str) -> std::result::Result<String, ImportError> {
        match self.get(column) {
            Some(value) => Ok(value.to_string()),
            None => match self.policy {
                ImportPolicy::Strict => Err(ImportError::MissingValue {
                    line: self.line,
                    column: column.to_string(),
                }),
                ImportPolicy::Lenient => Ok(fallback.to_string()),
            },
        }
    }

    /// A numeric cell; blank cells take `default`.
    pub fn number<N: FromStr>(&self, column: &str, default: N) -> std::result::Result<N, ImportError> {
        let Some(raw) = self.trimmed(column) else {
            return Ok(default);
        };
        match raw.parse::<N>() {
            Ok(value) => Ok(value),
            Err(_) => self.reject(default, || ImportError::InvalidNumber {
                line: self.line,
                column: column.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// A number the record cannot do without. Strict imports fail on a
    /// blank cell; lenient imports use `default`.
    pub fn required_number<N: FromStr>(&self, column: &str, default: N) -> std::result::Result<N, ImportError> {
        self.require_present(column)?;
        self.number(column, default)
    }

    /// A `YYYY-MM-DD` cell; blank cells are `None`.
    pub fn date(&self, column: &str) -> std::result::Result<Option<NaiveDate>, ImportError> {
        let Some(raw) = self.trimmed(column) else {
            return Ok(None);
        };
        match parse_date(raw) {
            Some(date) => Ok(Some(date)),
            None => self.reject(None, || ImportError::InvalidDate {
                line: self.line,
                column: column.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// A date the record cannot do without. Strict imports fail on a blank
    /// cell; lenient imports leave it unset.
    pub fn required_date(&self, column: &str) -> std::result::Result<Option<NaiveDate>, ImportError> {
        self.require_present(column)?;
        self.date(column)
    }

    fn require_present(&self, column: &str) -> std::result::Result<(), ImportError> {
        if self.policy == ImportPolicy::Strict && self.trimmed(column).is_none() {
            return Err(ImportError::MissingValue {
                line: self.line,
                column: column.to_string(),
            });
        }
        Ok(())
    }

    /// A closed-set value; blank cells take the type's default.
    pub fn choice<E: FromStr + Default>(&self, column: &str) -> std::result::Result<E, ImportError> {
        let Some(raw) = self.trimmed(column) else {
            return Ok(E::default());
        };
        match raw.parse::<E>() {
            Ok(value) => Ok(value),
            Err(_) => self.reject(E::default(), || ImportError::InvalidValue {
                line: self.line,
                column: column.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    fn reject<T>(&self, default: T, err: impl FnOnce() -> ImportError) -> std::result::Result<T, ImportError> {
        match self.policy {
            ImportPolicy::Strict => Err(err()),
            ImportPolicy::Lenient => {
                tracing::debug!(line = self.line, "substituting default for unparseable cell");
                Ok(default)
            }
        }
    }
}

/// Parse CSV text into records (without ids).
///
/// The first non-blank line is the header. Under [`ImportPolicy::Strict`]
/// any problem aborts the import; under [`ImportPolicy::Lenient`] short
/// rows are padded and bad cells defaulted.
pub fn import_csv<T: CsvRecord>(
    text: &str,
    dialect: CsvDialect,
    policy: ImportPolicy,
) -> std::result::Result<Vec<T>, ImportError> {
    let rows = tokenize(text, dialect)?;
    let mut rows = rows.into_iter();
    let header = rows.next().ok_or(ImportError::Empty)?;
    let headers: Vec<String> = header.cells.iter().map(|h| h.trim().to_string()).collect();

    let unknown: Vec<&str> = headers
        .iter()
        .map(String::as_str)
        .filter(|h| !T::COLUMNS.contains(h))
        .collect();
    if !unknown.is_empty() {
        tracing::debug!(columns = ?unknown, "ignoring unknown import columns");
    }

    if policy == ImportPolicy::Strict {
        let missing: Vec<String> = T::REQUIRED
            .iter()
            .filter(|c| !headers.iter().any(|h| h == *c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::HeaderMismatch { missing });
        }
    }

    let mut records = Vec::new();
    for raw in rows {
        if policy == ImportPolicy::Strict && raw.cells.len() != headers.len() {
            return Err(ImportError::CellCount {
                line: raw.line,
                expected: headers.len(),
                found: raw.cells.len(),
            });
        }
        let row = Row::new(raw.line, &headers, &raw.cells, policy);
        records.push(T::from_row(&row)?);
    }
    Ok(records)
}

/// Parse a JSON array previously produced by [`export_json`].
pub fn import_json<T: Record>(text: &str) -> std::result::Result<Vec<T>, ImportError> {
    serde_json::from_str(text).map_err(|e| ImportError::Json(e.to_string()))
}

/// Serialize records as CSV with every field double-quoted.
pub fn export_csv<T: CsvRecord>(records: &[T]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record(T::COLUMNS)?;
    for record in records {
        writer.write_record(record.to_row())?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| TrackbookError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| TrackbookError::Export(e.to_string()))
}

/// Serialize records as a pretty-printed JSON array.
pub fn export_json<T: Record>(records: &[T]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// A header-only CSV naming the import columns.
pub fn template<T: CsvRecord>() -> String {
    format!("{}\n", T::COLUMNS.join(","))
}
