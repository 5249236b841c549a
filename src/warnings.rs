//! Load-time warnings for trackbook.
//!
//! Storage problems never abort a session: a corrupt collection falls back
//! to its seed data. These warnings make that fallback visible instead of
//! silent.

/// A problem found while loading persisted data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A stored collection could not be parsed; seed data was used and the
    /// payload moved aside under `backup`.
    CorruptCollection {
        key: String,
        error: String,
        backup: Option<String>,
    },
    /// A stored collection could not be read at all; seed data was used.
    UnreadableCollection { key: String, error: String },
    /// A stored preference could not be parsed; the default was used.
    CorruptPreference { key: String, error: String },
    /// Records point at ids that do not exist.
    DanglingReferences {
        collection: &'static str,
        field: &'static str,
        count: usize,
    },
}

/// Count foreign keys that do not resolve.
///
/// # Arguments
/// * `collection` - Label of the referring collection
/// * `field` - Name of the foreign-key field
/// * `keys` - The foreign-key values that are set
/// * `exists` - Whether a referenced id exists
pub fn check_references<'a, I, F>(
    collection: &'static str,
    field: &'static str,
    keys: I,
    exists: F,
) -> Option<Warning>
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str) -> bool,
{
    let count = keys.into_iter().filter(|k| !exists(k)).count();
    (count > 0).then_some(Warning::DanglingReferences {
        collection,
        field,
        count,
    })
}

/// Format a warning for display.
pub fn format_warning(warning: &Warning) -> String {
    match warning {
        Warning::CorruptCollection { key, error, backup } => {
            let mut msg = format!(
                "Warning: stored data for '{}' is corrupt ({}); using seed data",
                key, error
            );
            if let Some(backup) = backup {
                msg.push_str(&format!(" - original kept as '{}'", backup));
            }
            msg
        }
        Warning::UnreadableCollection { key, error } => {
            format!(
                "Warning: stored data for '{}' could not be read ({}); using seed data",
                key, error
            )
        }
        Warning::CorruptPreference { key, error } => {
            format!(
                "Warning: preference '{}' is corrupt ({}); using default",
                key, error
            )
        }
        Warning::DanglingReferences {
            collection,
            field,
            count,
        } => {
            format!(
                "Warning: {} {} record(s) reference a missing {}",
                count, collection, field
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_warning_when_references_resolve() {
        let known = ["a", "b"];
        let warning = check_references("student", "class_id", ["a", "b", "a"], |k| {
            known.contains(&k)
        });
        assert!(warning.is_none());
    }

    #[test]
    fn test_dangling_references_counted() {
        let known = ["a"];
        let warning = check_references("student", "class_id", ["a", "x", "y"], |k| {
            known.contains(&k)
        });
        match warning {
            Some(Warning::DanglingReferences { count, field, .. }) => {
                assert_eq!(count, 2);
                assert_eq!(field, "class_id");
            }
            other => panic!("Expected DanglingReferences warning, got {:?}", other),
        }
    }

    #[test]
    fn test_format_corrupt_collection() {
        let warning = Warning::CorruptCollection {
            key: "inventory.items".to_string(),
            error: "expected value at line 1".to_string(),
            backup: Some("inventory.items.corrupt".to_string()),
        };
        let msg = format_warning(&warning);
        assert!(msg.contains("inventory.items"));
        assert!(msg.contains("seed data"));
        assert!(msg.contains("inventory.items.corrupt"));
    }

    #[test]
    fn test_format_dangling() {
        let warning = Warning::DanglingReferences {
            collection: "shipment",
            field: "vehicle_id",
            count: 3,
        };
        assert_eq!(
            format_warning(&warning),
            "Warning: 3 shipment record(s) reference a missing vehicle_id"
        );
    }
}
