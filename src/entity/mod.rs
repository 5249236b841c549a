pub mod agile;
pub mod inventory;
pub mod school;
pub mod telehealth;
pub mod transport;

use std::fmt::Debug;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Label shown in place of a foreign key that does not resolve.
pub const UNASSIGNED: &str = "Unassigned";

/// A flat record stored in a collection.
///
/// Every record carries a unique string id generated on creation. The
/// collection it belongs to is persisted as a JSON array under `KEY`.
pub trait Record: Clone + Debug + Serialize + DeserializeOwned {
    /// Fixed storage key of the collection, e.g. `school.students`.
    const KEY: &'static str;
    /// Singular human-readable label, e.g. `student`.
    const LABEL: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

/// Generate a fresh record identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Shorten an id for display (first 7 chars).
pub fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Format an optional date for CSV cells and form fields.
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Find a record by id in a slice.
pub fn find<'a, T: Record>(records: &'a [T], id: &str) -> Option<&'a T> {
    records.iter().find(|r| r.id() == id)
}

/// Resolve an optional foreign key to a label, falling back to
/// [`UNASSIGNED`] when it is unset or dangling.
pub fn resolve_label<'a, T: Record>(
    records: &'a [T],
    id: Option<&str>,
    label: impl Fn(&'a T) -> &'a str,
) -> &'a str {
    id.and_then(|id| find(records, id))
        .map(label)
        .unwrap_or(UNASSIGNED)
}

/// Turn an optional form/CSV string into `None` when blank.
pub(crate) fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Widget {
        id: String,
        name: String,
    }

    impl Record for Widget {
        const KEY: &'static str = "test.widgets";
        const LABEL: &'static str = "widget";

        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
        assert_eq!(new_id().len(), 36);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("a1b2c3d4-e5f6"), "a1b2c3d");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_parse_and_format_date() {
        let date = parse_date("2024-09-01").unwrap();
        assert_eq!(format_date(Some(date)), "2024-09-01");
        assert_eq!(format_date(None), "");
        assert!(parse_date("09/01/2024").is_none());
    }

    #[test]
    fn test_resolve_label_falls_back() {
        let widgets = vec![Widget {
            id: "w1".to_string(),
            name: "Sprocket".to_string(),
        }];
        assert_eq!(resolve_label(&widgets, Some("w1"), |w| &w.name), "Sprocket");
        assert_eq!(resolve_label(&widgets, Some("gone"), |w| &w.name), UNASSIGNED);
        assert_eq!(resolve_label(&widgets, None, |w| &w.name), UNASSIGNED);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("  "), None);
        assert_eq!(non_blank(" x "), Some("x".to_string()));
    }
}
