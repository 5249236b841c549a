use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackbookError {
    #[error("Not in a trackbook project. Run 'trackbook init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .trackbook/ to reinitialize.")]
    AlreadyInitialized,

    #[error("{collection} record not found: {id}")]
    RecordNotFound { collection: &'static str, id: String },

    #[error("{0}")]
    InvalidCollection(String),

    #[error("Invalid update for {collection}: {message}")]
    InvalidPatch {
        collection: &'static str,
        message: String,
    },

    #[error("Unknown filter '{key}'. Valid filters: {valid}")]
    InvalidFilter { key: String, valid: String },

    #[error("Unknown sort key '{key}'. Valid keys: {valid}")]
    InvalidSortKey { key: String, valid: String },

    #[error("No form is open")]
    NoActiveModal,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A form field that failed synchronous validation on submit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn required(field: &'static str) -> Self {
        Self::new(field, "is required")
    }
}

/// Problems found while reading an import payload.
///
/// Line numbers are 1-based and count the header as line 1.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("the file has no header row")]
    Empty,

    #[error("missing required column(s): {}", .missing.join(", "))]
    HeaderMismatch { missing: Vec<String> },

    #[error("line {line}: expected {expected} cells, found {found}")]
    CellCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: '{value}' is not a number (column {column})")]
    InvalidNumber {
        line: usize,
        column: String,
        value: String,
    },

    #[error("line {line}: '{value}' is not a YYYY-MM-DD date (column {column})")]
    InvalidDate {
        line: usize,
        column: String,
        value: String,
    },

    #[error("line {line}: '{value}' is not an accepted value (column {column})")]
    InvalidValue {
        line: usize,
        column: String,
        value: String,
    },

    #[error("line {line}: {column} is required")]
    MissingValue { line: usize, column: String },

    #[error("malformed CSV payload: {0}")]
    Malformed(String),

    #[error("malformed JSON payload: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, TrackbookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_mismatch_lists_columns() {
        let err = ImportError::HeaderMismatch {
            missing: vec!["Student ID".to_string(), "Full Name".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "missing required column(s): Student ID, Full Name"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = TrackbookError::from(ValidationError::required("name"));
        assert_eq!(err.to_string(), "name: is required");
    }

    #[test]
    fn test_not_found_names_collection() {
        let err = TrackbookError::RecordNotFound {
            collection: "student",
            id: "abc".to_string(),
        };
        assert!(err.to_string().contains("student"));
        assert!(err.to_string().contains("abc"));
    }
}
