use crate::error::Result;
use crate::warnings::Warning;

use super::KvBackend;

/// Read the dark-mode flag stored under `key`.
///
/// A missing key means light mode. A corrupt value also means light mode
/// and is reported as a warning.
pub fn load_dark_mode(backend: &dyn KvBackend, key: &str) -> (bool, Option<Warning>) {
    let raw = match backend.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return (false, None),
        Err(e) => {
            tracing::warn!(key, error = %e, "dark mode preference unreadable");
            return (
                false,
                Some(Warning::CorruptPreference {
                    key: key.to_string(),
                    error: e.to_string(),
                }),
            );
        }
    };

    match serde_json::from_str::<bool>(&raw) {
        Ok(value) => (value, None),
        Err(e) => {
            tracing::warn!(key, error = %e, "dark mode preference corrupt");
            (
                false,
                Some(Warning::CorruptPreference {
                    key: key.to_string(),
                    error: e.to_string(),
                }),
            )
        }
    }
}

pub fn save_dark_mode(backend: &mut dyn KvBackend, key: &str, enabled: bool) -> Result<()> {
    backend.set(key, &serde_json::to_string(&enabled)?)?;
    tracing::debug!(key, enabled, "saved dark mode preference");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    #[test]
    fn test_defaults_to_light() {
        let backend = MemoryBackend::new();
        assert_eq!(load_dark_mode(&backend, "school.dark_mode"), (false, None));
    }

    #[test]
    fn test_round_trip() {
        let mut backend = MemoryBackend::new();
        save_dark_mode(&mut backend, "school.dark_mode", true).unwrap();
        assert_eq!(backend.get("school.dark_mode").unwrap().as_deref(), Some("true"));
        assert_eq!(load_dark_mode(&backend, "school.dark_mode"), (true, None));

        save_dark_mode(&mut backend, "school.dark_mode", false).unwrap();
        assert_eq!(load_dark_mode(&backend, "school.dark_mode").0, false);
    }

    #[test]
    fn test_corrupt_value_warns() {
        let mut backend = MemoryBackend::new();
        backend.set("agile.dark_mode", "maybe").unwrap();
        let (enabled, warning) = load_dark_mode(&backend, "agile.dark_mode");
        assert!(!enabled);
        assert!(matches!(warning, Some(Warning::CorruptPreference { .. })));
    }
}
