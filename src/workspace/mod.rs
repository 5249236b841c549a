//! Per-app datasets and the operations the controller routes to them.
//!
//! Each app owns a handful of collections, a cascade policy for deletes,
//! typed form state per entity kind, and the derived views shown for it.

pub mod agile;
pub mod inventory;
pub mod school;
pub mod telehealth;
pub mod transport;

pub use agile::AgileWorkspace;
pub use inventory::InventoryWorkspace;
pub use school::SchoolWorkspace;
pub use telehealth::TelehealthWorkspace;
pub use transport::TransportWorkspace;

use std::fmt::{Debug, Display};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{parse_date, Record};
use crate::error::{Result, TrackbookError, ValidationError};
use crate::storage::{Collection, KvBackend, Patch};
use crate::transfer::{self, CsvDialect, CsvRecord, Format, ImportPolicy};
use crate::view::{Query, Sentinel, SortState};
use crate::warnings::Warning;

/// The apps trackbook hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    #[default]
    School,
    Inventory,
    Agile,
    Transport,
    Telehealth,
}

impl AppKind {
    pub const ALL: [AppKind; 5] = [
        AppKind::School,
        AppKind::Inventory,
        AppKind::Agile,
        AppKind::Transport,
        AppKind::Telehealth,
    ];

    /// Storage key of the app's dark-mode preference.
    pub fn dark_mode_key(self) -> &'static str {
        match self {
            AppKind::School => "school.dark_mode",
            AppKind::Inventory => "inventory.dark_mode",
            AppKind::Agile => "agile.dark_mode",
            AppKind::Transport => "transport.dark_mode",
            AppKind::Telehealth => "telehealth.dark_mode",
        }
    }
}

impl std::fmt::Display for AppKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppKind::School => write!(f, "school"),
            AppKind::Inventory => write!(f, "inventory"),
            AppKind::Agile => write!(f, "agile"),
            AppKind::Transport => write!(f, "transport"),
            AppKind::Telehealth => write!(f, "telehealth"),
        }
    }
}

impl FromStr for AppKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "school" | "students" => Ok(AppKind::School),
            "inventory" => Ok(AppKind::Inventory),
            "agile" => Ok(AppKind::Agile),
            "transport" | "fleet" => Ok(AppKind::Transport),
            "telehealth" | "clinic" => Ok(AppKind::Telehealth),
            _ => Err(format!(
                "Unknown app '{}'. Valid apps: school, inventory, agile, transport, telehealth",
                s
            )),
        }
    }
}

/// The collections of one app, used to address operations by name.
pub trait EntityKind: Copy + Eq + Debug + Display + FromStr<Err = String> + 'static {
    const ALL: &'static [Self];
}

/// Text-field form state for one entity kind.
pub trait FormState: Clone + Debug {
    type Kind: EntityKind;

    /// The entity kind this form edits.
    fn kind(&self) -> Self::Kind;

    /// Set a field by name.
    fn set(&mut self, field: &str, value: &str) -> Result<()>;

    /// Field names and current values, in display order.
    fn fields(&self) -> Vec<(&'static str, String)>;
}

/// One row of a listing: a printable summary and the record with its
/// derived fields as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub id: String,
    pub summary: String,
    pub detail: Value,
}

/// A labelled dashboard figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stat {
    pub label: String,
    pub value: String,
}

impl Stat {
    pub fn new(label: impl Into<String>, value: impl ToString) -> Self {
        Self {
            label: label.into(),
            value: value.to_string(),
        }
    }
}

/// What a delete removed beyond the record itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub label: String,
    /// Dependent records removed with it.
    pub cascaded: usize,
    /// Dependent records whose reference was cleared.
    pub unlinked: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    pub format: Format,
    pub dialect: CsvDialect,
    pub policy: ImportPolicy,
}

/// An app's dataset plus the operations routed to it.
pub trait Workspace: Sized {
    type Kind: EntityKind;
    type Form: FormState<Kind = Self::Kind>;

    const APP: AppKind;
    /// How CSV rows that do not fit are handled.
    const IMPORT_POLICY: ImportPolicy;
    /// What aggregates over empty sets report.
    const SENTINEL: Sentinel;

    fn load(backend: &mut dyn KvBackend) -> (Self, Vec<Warning>);

    fn blank_form(kind: Self::Kind) -> Self::Form;

    /// Form pre-populated from an existing record.
    fn edit_form(&self, kind: Self::Kind, id: &str) -> Result<Self::Form>;

    /// Validate `form` and save it. `target` is the id being edited, or
    /// `None` to create. Returns the saved record's id.
    fn submit(
        &mut self,
        backend: &mut dyn KvBackend,
        form: &Self::Form,
        target: Option<&str>,
    ) -> Result<String>;

    /// Shallow-merge a JSON patch into a record.
    fn patch(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: Self::Kind,
        id: &str,
        patch: &Patch,
    ) -> Result<String>;

    /// Delete a record and apply the app's cascade policy.
    fn delete(&mut self, backend: &mut dyn KvBackend, kind: Self::Kind, id: &str) -> Result<DeleteReport>;

    /// Append records parsed from `text`; returns how many were added.
    fn import(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: Self::Kind,
        text: &str,
        options: &ImportOptions,
    ) -> Result<usize>;

    fn export(&self, kind: Self::Kind, format: Format) -> Result<String>;

    fn template(kind: Self::Kind) -> String;

    /// Filtered, sorted rows of a collection.
    fn listing(&self, kind: Self::Kind, query: &Query, sort: &SortState) -> Result<Vec<Entry>>;

    fn entry(&self, kind: Self::Kind, id: &str) -> Result<Entry>;

    fn dashboard(&self) -> Vec<Stat>;
}

/// Parse and append an import payload into `collection`.
pub(crate) fn import_into<T: CsvRecord>(
    collection: &mut Collection<T>,
    backend: &mut dyn KvBackend,
    text: &str,
    options: &ImportOptions,
) -> Result<usize> {
    let ids = match options.format {
        Format::Csv => {
            let records = transfer::import_csv::<T>(text, options.dialect, options.policy)?;
            collection.append(backend, records)?
        }
        Format::Json => {
            let records = transfer::import_json::<T>(text)?;
            let report = collection.append_keeping_ids(backend, records)?;
            for (incoming, assigned) in &report.rekeyed {
                tracing::warn!(
                    collection = T::LABEL,
                    incoming = %incoming,
                    assigned = %assigned,
                    "imported id already in use, record re-keyed"
                );
            }
            report.ids
        }
    };
    tracing::info!(
        collection = T::LABEL,
        format = %options.format,
        policy = %options.policy,
        count = ids.len(),
        "imported records"
    );
    Ok(ids.len())
}

/// Create `record`, or replace the record `target` when editing.
pub(crate) fn save<T: Record>(
    collection: &mut Collection<T>,
    backend: &mut dyn KvBackend,
    mut record: T,
    target: Option<&str>,
) -> Result<String> {
    match target {
        Some(id) => {
            collection.require(id)?;
            record.set_id(id.to_string());
            collection.replace(backend, record)?;
            Ok(id.to_string())
        }
        None => Ok(collection.create(backend, record)?.id().to_string()),
    }
}

/// Write back a dependent collection after a later cascade step failed.
///
/// Cascades touch dependents before the parent, so a failure on the parent
/// write must undo the dependent writes already made. The caller's error
/// is the one reported; a failed rollback is only logged.
pub(crate) fn roll_back<T: Record>(collection: &mut Collection<T>, backend: &mut dyn KvBackend, previous: Vec<T>) {
    if let Err(e) = collection.restore(backend, previous) {
        tracing::error!(collection = T::LABEL, error = %e, "could not roll back cascade");
    }
}

pub(crate) fn export_from<T: CsvRecord>(collection: &Collection<T>, format: Format) -> Result<String> {
    match format {
        Format::Csv => transfer::export_csv(collection.records()),
        Format::Json => transfer::export_json(collection.records()),
    }
}

/// Build a listing entry from a record plus derived fields.
pub(crate) fn entry_for<T: Record>(record: &T, summary: String, derived: &[(&str, Value)]) -> Result<Entry> {
    let mut detail = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut detail {
        for (name, value) in derived {
            map.insert(name.to_string(), value.clone());
        }
    }
    Ok(Entry {
        id: record.id().to_string(),
        summary,
        detail,
    })
}

pub(crate) fn unknown_field(field: &str) -> TrackbookError {
    TrackbookError::Validation(ValidationError::new(
        "form",
        format!("unknown field '{}'", field),
    ))
}

pub(crate) fn required(field: &'static str, value: &str) -> std::result::Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::required(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// A required number.
pub(crate) fn number<N: FromStr>(field: &'static str, value: &str) -> std::result::Result<N, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required(field));
    }
    trimmed
        .parse()
        .map_err(|_| ValidationError::new(field, format!("'{}' is not a number", trimmed)))
}

/// A number that defaults when blank.
pub(crate) fn number_or<N: FromStr>(
    field: &'static str,
    value: &str,
    default: N,
) -> std::result::Result<N, ValidationError> {
    if value.trim().is_empty() {
        Ok(default)
    } else {
        number(field, value)
    }
}

pub(crate) fn optional_date(
    field: &'static str,
    value: &str,
) -> std::result::Result<Option<NaiveDate>, ValidationError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_date(value)
        .map(Some)
        .ok_or_else(|| ValidationError::new(field, format!("'{}' is not a YYYY-MM-DD date", value.trim())))
}

/// A closed-set value; blank takes the default.
pub(crate) fn choice<E: FromStr<Err = String> + Default>(
    field: &'static str,
    value: &str,
) -> std::result::Result<E, ValidationError> {
    if value.trim().is_empty() {
        Ok(E::default())
    } else {
        value.trim().parse().map_err(|e: String| ValidationError::new(field, e))
    }
}

/// An optional reference that must resolve when set.
pub(crate) fn reference<T: Record>(
    field: &'static str,
    value: &str,
    collection: &Collection<T>,
) -> std::result::Result<Option<String>, ValidationError> {
    match crate::entity::non_blank(value) {
        None => Ok(None),
        Some(id) if collection.contains(&id) => Ok(Some(id)),
        Some(id) => Err(ValidationError::new(
            field,
            format!("no {} with id '{}'", T::LABEL, id),
        )),
    }
}

/// A reference that must be set and resolve.
pub(crate) fn required_reference<T: Record>(
    field: &'static str,
    value: &str,
    collection: &Collection<T>,
) -> std::result::Result<String, ValidationError> {
    reference(field, value, collection)?.ok_or_else(|| ValidationError::required(field))
}

pub(crate) fn json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
