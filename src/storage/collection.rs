use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::entity::{new_id, Record};
use crate::error::{Result, TrackbookError};
use crate::warnings::Warning;

use super::KvBackend;

/// A shallow patch: top-level field name -> new JSON value.
pub type Patch = Map<String, Value>;

/// Ids assigned by `Collection::append_keeping_ids`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AppendReport {
    pub ids: Vec<String>,
    /// `(incoming id, assigned id)` for each record whose id collided.
    pub rekeyed: Vec<(String, String)>,
}

/// An ordered, persisted collection of records.
///
/// Every mutation builds the next version of the collection, writes the
/// whole of it under `T::KEY`, and only then replaces the in-memory
/// records. A failed write leaves the collection untouched.
#[derive(Debug, Clone)]
pub struct Collection<T: Record> {
    records: Vec<T>,
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self { records }
    }

    /// Load the collection from `backend`.
    ///
    /// An absent key yields the seed dataset. A payload that cannot be read
    /// or parsed also yields the seed dataset, together with a warning; a
    /// corrupt payload is first copied to `<key>.corrupt`.
    pub fn load(backend: &mut dyn KvBackend, seed: impl FnOnce() -> Vec<T>) -> (Self, Option<Warning>) {
        let raw = match backend.get(T::KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key = T::KEY, "no stored data, using seed");
                return (Self::new(seed()), None);
            }
            Err(e) => {
                tracing::warn!(key = T::KEY, error = %e, "stored data unreadable, using seed");
                let warning = Warning::UnreadableCollection {
                    key: T::KEY.to_string(),
                    error: e.to_string(),
                };
                return (Self::new(seed()), Some(warning));
            }
        };

        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(records) => {
                tracing::debug!(key = T::KEY, count = records.len(), "loaded collection");
                (Self::new(records), None)
            }
            Err(e) => {
                tracing::warn!(key = T::KEY, error = %e, "stored data corrupt, using seed");
                let backup_key = format!("{}.corrupt", T::KEY);
                let backup = match backend.set(&backup_key, &raw) {
                    Ok(()) => Some(backup_key),
                    Err(err) => {
                        tracing::warn!(key = T::KEY, error = %err, "could not keep corrupt payload");
                        None
                    }
                };
                let warning = Warning::CorruptCollection {
                    key: T::KEY.to_string(),
                    error: e.to_string(),
                    backup,
                };
                (Self::new(seed()), Some(warning))
            }
        }
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Look a record up or fail with `RecordNotFound`.
    pub fn require(&self, id: &str) -> Result<&T> {
        self.get(id).ok_or_else(|| not_found::<T>(id))
    }

    /// The records as they are now, for a later `restore`.
    pub fn snapshot(&self) -> Vec<T> {
        self.records.clone()
    }

    /// Write `records` back under the key and adopt them.
    pub fn restore(&mut self, backend: &mut dyn KvBackend, records: Vec<T>) -> Result<()> {
        self.commit(backend, records)
    }

    /// Append a record under a fresh id and persist.
    pub fn create(&mut self, backend: &mut dyn KvBackend, mut record: T) -> Result<T> {
        record.set_id(new_id());
        let mut next = self.records.clone();
        next.push(record.clone());
        self.commit(backend, next)?;
        tracing::info!(collection = T::LABEL, id = record.id(), "created record");
        Ok(record)
    }

    /// Shallow-merge `patch` over the record with `id` and persist.
    ///
    /// The `id` field cannot be patched. Keys the record does not have are
    /// rejected rather than dropped.
    pub fn update(&mut self, backend: &mut dyn KvBackend, id: &str, patch: &Patch) -> Result<T> {
        let existing = self.require(id)?;
        let mut merged = match serde_json::to_value(existing)? {
            Value::Object(map) => map,
            _ => {
                return Err(TrackbookError::InvalidPatch {
                    collection: T::LABEL,
                    message: "record is not an object".to_string(),
                })
            }
        };
        for (field, value) in patch {
            if field == "id" {
                continue;
            }
            if !merged.contains_key(field) {
                return Err(TrackbookError::InvalidPatch {
                    collection: T::LABEL,
                    message: format!("unknown field '{}'", field),
                });
            }
            merged.insert(field.clone(), value.clone());
        }
        let updated: T = serde_json::from_value(Value::Object(merged)).map_err(|e| {
            TrackbookError::InvalidPatch {
                collection: T::LABEL,
                message: e.to_string(),
            }
        })?;
        self.replace(backend, updated)
    }

    /// Replace the record sharing `record`'s id and persist.
    pub fn replace(&mut self, backend: &mut dyn KvBackend, record: T) -> Result<T> {
        let index = self.position(record.id())?;
        let mut next = self.records.clone();
        next[index] = record.clone();
        self.commit(backend, next)?;
        tracing::info!(collection = T::LABEL, id = record.id(), "updated record");
        Ok(record)
    }

    /// Remove the record with `id` and persist.
    pub fn delete(&mut self, backend: &mut dyn KvBackend, id: &str) -> Result<T> {
        let index = self.position(id)?;
        let mut next = self.records.clone();
        let removed = next.remove(index);
        self.commit(backend, next)?;
        tracing::info!(collection = T::LABEL, id, "deleted record");
        Ok(removed)
    }

    /// Remove every record matching `pred`; persists only when something
    /// was removed. Returns the number removed.
    pub fn remove_where<F: FnMut(&T) -> bool>(&mut self, backend: &mut dyn KvBackend, mut pred: F) -> Result<usize> {
        let next: Vec<T> = self.records.iter().filter(|r| !pred(*r)).cloned().collect();
        let removed = self.records.len() - next.len();
        if removed > 0 {
            self.commit(backend, next)?;
            tracing::info!(collection = T::LABEL, removed, "cascade removed records");
        }
        Ok(removed)
    }

    /// Apply `f` to every record matching `pred`; persists only when
    /// something matched. Returns the number changed.
    pub fn update_where<P, F>(&mut self, backend: &mut dyn KvBackend, mut pred: P, mut f: F) -> Result<usize>
    where
        P: FnMut(&T) -> bool,
        F: FnMut(&mut T),
    {
        let mut next = self.records.clone();
        let mut changed = 0;
        for record in next.iter_mut() {
            if pred(&*record) {
                f(record);
                changed += 1;
            }
        }
        if changed > 0 {
            self.commit(backend, next)?;
            tracing::info!(collection = T::LABEL, changed, "cascade updated records");
        }
        Ok(changed)
    }

    /// Append many records under fresh ids with a single write.
    pub fn append(&mut self, backend: &mut dyn KvBackend, records: Vec<T>) -> Result<Vec<String>> {
        let mut next = self.records.clone();
        let mut ids = Vec::with_capacity(records.len());
        for mut record in records {
            let id = new_id();
            record.set_id(id.clone());
            ids.push(id);
            next.push(record);
        }
        self.commit(backend, next)?;
        Ok(ids)
    }

    /// Append many records keeping their ids, except blank or colliding
    /// ones which are re-keyed.
    ///
    /// Only this collection's ids are rewritten; references held in other
    /// collections keep the incoming id. The report lists every re-key.
    pub fn append_keeping_ids(&mut self, backend: &mut dyn KvBackend, records: Vec<T>) -> Result<AppendReport> {
        let mut taken: HashSet<String> = self.records.iter().map(|r| r.id().to_string()).collect();
        let mut next = self.records.clone();
        let mut report = AppendReport::default();
        for mut record in records {
            if record.id().is_empty() {
                record.set_id(new_id());
            } else if taken.contains(record.id()) {
                let incoming = record.id().to_string();
                record.set_id(new_id());
                report.rekeyed.push((incoming, record.id().to_string()));
            }
            taken.insert(record.id().to_string());
            report.ids.push(record.id().to_string());
            next.push(record);
        }
        self.commit(backend, next)?;
        Ok(report)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| not_found::<T>(id))
    }

    fn commit(&mut self, backend: &mut dyn KvBackend, next: Vec<T>) -> Result<()> {
        write_all(backend, &next)?;
        self.records = next;
        Ok(())
    }
}

fn write_all<T: Record>(backend: &mut dyn KvBackend, records: &[T]) -> Result<()> {
    let json = serde_json::to_string(records)?;
    backend.set(T::KEY, &json)
}

fn not_found<T: Record>(id: &str) -> TrackbookError {
    TrackbookError::RecordNotFound {
        collection: T::LABEL,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book {
        id: String,
        title: String,
        pages: u32,
        #[serde(default)]
        shelf: Option<String>,
    }

    impl Record for Book {
        const KEY: &'static str = "test.books";
        const LABEL: &'static str = "book";

        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    fn book(title: &str, pages: u32) -> Book {
        Book {
            id: String::new(),
            title: title.to_string(),
            pages,
            shelf: None,
        }
    }

    fn seed() -> Vec<Book> {
        vec![Book {
            id: "seed-1".to_string(),
            ..book("Seed", 10)
        }]
    }

    /// Backend whose writes always fail.
    struct ReadOnly;

    impl KvBackend for ReadOnly {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(TrackbookError::Storage("read-only".to_string()))
        }

        fn remove(&mut self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_absent_key_uses_seed() {
        let mut backend = MemoryBackend::new();
        let (books, warning) = Collection::<Book>::load(&mut backend, seed);
        assert!(warning.is_none());
        assert_eq!(books.len(), 1);
        assert_eq!(books.records()[0].title, "Seed");
    }

    #[test]
    fn test_corrupt_payload_falls_back_with_warning() {
        let mut backend = MemoryBackend::new();
        backend.set("test.books", "{not json").unwrap();

        let (books, warning) = Collection::<Book>::load(&mut backend, seed);
        assert_eq!(books.records()[0].id, "seed-1");
        match warning {
            Some(Warning::CorruptCollection { key, backup, .. }) => {
                assert_eq!(key, "test.books");
                assert_eq!(backup.as_deref(), Some("test.books.corrupt"));
            }
            other => panic!("Expected CorruptCollection warning, got {:?}", other),
        }
        assert_eq!(
            backend.get("test.books.corrupt").unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn test_create_assigns_id_and_persists() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();

        let created = books.create(&mut backend, book("Dune", 412)).unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(books.len(), 1);

        let (reloaded, _) = Collection::<Book>::load(&mut backend, Vec::new);
        assert_eq!(reloaded.records(), books.records());
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();
        for title in ["c", "a", "b"] {
            books.create(&mut backend, book(title, 1)).unwrap();
        }
        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_update_merges_patch() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();
        let created = books.create(&mut backend, book("Dune", 412)).unwrap();

        let patch = json!({"pages": 500, "shelf": "B2", "id": "hijack"});
        let updated = books
            .update(&mut backend, &created.id, patch.as_object().unwrap())
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "Dune");
        assert_eq!(updated.pages, 500);
        assert_eq!(updated.shelf.as_deref(), Some("B2"));
        assert_eq!(books.get(&created.id).unwrap().pages, 500);
    }

    #[test]
    fn test_update_rejects_wrong_type() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();
        let created = books.create(&mut backend, book("Dune", 412)).unwrap();

        let patch = json!({"pages": "many"});
        let err = books
            .update(&mut backend, &created.id, patch.as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, TrackbookError::InvalidPatch { .. }));
        assert_eq!(books.get(&created.id).unwrap().pages, 412);
    }

    #[test]
    fn test_update_rejects_unknown_field() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();
        let created = books.create(&mut backend, book("Dune", 412)).unwrap();

        let patch = json!({"Title": "Renamed"});
        let err = books
            .update(&mut backend, &created.id, patch.as_object().unwrap())
            .unwrap_err();
        match err {
            TrackbookError::InvalidPatch { message, .. } => assert_eq!(message, "unknown field 'Title'"),
            other => panic!("Expected InvalidPatch, got {:?}", other),
        }
        assert_eq!(books.get(&created.id).unwrap().title, "Dune");
    }

    #[test]
    fn test_update_accepts_null_optional_field() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();
        let created = books.create(&mut backend, book("Dune", 412)).unwrap();

        let patch = json!({"shelf": "A1"});
        let updated = books
            .update(&mut backend, &created.id, patch.as_object().unwrap())
            .unwrap();
        assert_eq!(updated.shelf.as_deref(), Some("A1"));
    }

    #[test]
    fn test_restore_writes_snapshot_back() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();
        books.create(&mut backend, book("A", 1)).unwrap();
        let before = books.snapshot();

        books.remove_where(&mut backend, |_| true).unwrap();
        assert!(books.is_empty());

        books.restore(&mut backend, before.clone()).unwrap();
        assert_eq!(books.records(), before.as_slice());
        let (reloaded, _) = Collection::<Book>::load(&mut backend, Vec::new);
        assert_eq!(reloaded.records(), before.as_slice());
    }

    #[test]
    fn test_update_and_delete_report_not_found() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();

        let err = books.update(&mut backend, "nope", &Patch::new()).unwrap_err();
        assert!(matches!(err, TrackbookError::RecordNotFound { collection: "book", .. }));

        let err = books.delete(&mut backend, "nope").unwrap_err();
        assert!(matches!(err, TrackbookError::RecordNotFound { .. }));
    }

    #[test]
    fn test_delete_removes_record() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();
        let a = books.create(&mut backend, book("A", 1)).unwrap();
        let b = books.create(&mut backend, book("B", 2)).unwrap();

        let removed = books.delete(&mut backend, &a.id).unwrap();
        assert_eq!(removed.title, "A");
        assert_eq!(books.len(), 1);
        assert!(books.contains(&b.id));
    }

    #[test]
    fn test_failed_write_leaves_collection_unchanged() {
        let mut backend = ReadOnly;
        let mut books = Collection::new(seed());
        assert!(books.create(&mut backend, book("Lost", 1)).is_err());
        assert!(books.delete(&mut backend, "seed-1").is_err());
        assert_eq!(books.records(), seed().as_slice());
    }

    #[test]
    fn test_remove_and_update_where() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();
        for (title, pages) in [("a", 10), ("b", 200), ("c", 300)] {
            books.create(&mut backend, book(title, pages)).unwrap();
        }

        let changed = books
            .update_where(&mut backend, |b| b.pages > 100, |b| b.shelf = Some("tall".into()))
            .unwrap();
        assert_eq!(changed, 2);

        let removed = books.remove_where(&mut backend, |b| b.pages < 100).unwrap();
        assert_eq!(removed, 1);
        assert!(books.iter().all(|b| b.shelf.as_deref() == Some("tall")));
        assert_eq!(books.remove_where(&mut backend, |_| false).unwrap(), 0);
    }

    #[test]
    fn test_append_keeping_ids_rekeys_collisions() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::new(seed());
        let incoming = vec![
            Book { id: "seed-1".to_string(), ..book("Clash", 1) },
            Book { id: "fresh".to_string(), ..book("Fresh", 2) },
        ];

        let report = books.append_keeping_ids(&mut backend, incoming).unwrap();
        assert_eq!(books.len(), 3);
        assert_ne!(report.ids[0], "seed-1");
        assert_eq!(report.ids[1], "fresh");
        assert_eq!(books.get("seed-1").unwrap().title, "Seed");
        assert_eq!(report.rekeyed, vec![("seed-1".to_string(), report.ids[0].clone())]);
    }

    #[test]
    fn test_append_keeping_ids_fills_blank_ids_quietly() {
        let mut backend = MemoryBackend::new();
        let mut books = Collection::<Book>::default();

        let report = books.append_keeping_ids(&mut backend, vec![book("Untitled", 3)]).unwrap();
        assert_eq!(report.ids.len(), 1);
        assert!(!report.ids[0].is_empty());
        assert!(report.rekeyed.is_empty());
    }
}
