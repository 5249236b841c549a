//! Interaction state for one app session.
//!
//! The controller is the only thing that mutates a workspace. It holds the
//! single modal, the form being edited, the active query and sort, the
//! theme flag and a queue of notices for the caller to display.

use crate::error::{Result, TrackbookError, ValidationError};
use crate::storage::{load_dark_mode, save_dark_mode, KvBackend, Patch};
use crate::transfer::{CsvDialect, Format, ImportPolicy};
use crate::view::{Query, SortState};
use crate::warnings::{format_warning, Warning};
use crate::workspace::{DeleteReport, Entry, FormState, ImportOptions, Stat, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Add,
    Edit,
    View,
    Delete,
    Import,
}

impl std::fmt::Display for ModalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModalKind::Add => write!(f, "add"),
            ModalKind::Edit => write!(f, "edit"),
            ModalKind::View => write!(f, "view"),
            ModalKind::Delete => write!(f, "delete"),
            ModalKind::Import => write!(f, "import"),
        }
    }
}

/// At most one modal is open at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal<K> {
    Closed,
    Open {
        kind: ModalKind,
        entity: K,
        /// Record the modal acts on; `None` for add and import.
        target: Option<String>,
    },
}

impl<K> Modal<K> {
    pub fn is_open(&self) -> bool {
        matches!(self, Modal::Open { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Info(msg) => write!(f, "{}", msg),
            Notice::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

pub struct Controller<W: Workspace> {
    backend: Box<dyn KvBackend>,
    workspace: W,
    modal: Modal<W::Kind>,
    form: Option<W::Form>,
    query: Query,
    sort: SortState,
    dark_mode: bool,
    dialect: CsvDialect,
    import_policy: ImportPolicy,
    notices: Vec<Notice>,
    warnings: Vec<Warning>,
}

impl<W: Workspace> Controller<W> {
    /// Load the app's collections and theme from `backend`.
    ///
    /// Storage problems do not fail the load; they are logged and kept in
    /// [`Controller::warnings`].
    pub fn open(mut backend: Box<dyn KvBackend>) -> Self {
        let (workspace, mut warnings) = W::load(backend.as_mut());
        let (dark_mode, theme_warning) = load_dark_mode(backend.as_ref(), W::APP.dark_mode_key());
        warnings.extend(theme_warning);
        for warning in &warnings {
            tracing::warn!(app = %W::APP, "{}", format_warning(warning));
        }
        tracing::debug!(app = %W::APP, dark_mode, "session opened");

        Self {
            backend,
            workspace,
            modal: Modal::Closed,
            form: None,
            query: Query::new(),
            sort: SortState::new(),
            dark_mode,
            dialect: CsvDialect::default(),
            import_policy: W::IMPORT_POLICY,
            notices: Vec::new(),
            warnings,
        }
    }

    /// Override the CSV dialect and, optionally, the app's import policy.
    pub fn with_import_settings(mut self, dialect: CsvDialect, policy: Option<ImportPolicy>) -> Self {
        self.set_import_settings(dialect, policy);
        self
    }

    pub fn set_import_settings(&mut self, dialect: CsvDialect, policy: Option<ImportPolicy>) {
        self.dialect = dialect;
        self.import_policy = policy.unwrap_or(W::IMPORT_POLICY);
    }

    pub fn import_settings(&self) -> (CsvDialect, ImportPolicy) {
        (self.dialect, self.import_policy)
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    pub fn backend(&self) -> &dyn KvBackend {
        self.backend.as_ref()
    }

    pub fn modal(&self) -> &Modal<W::Kind> {
        &self.modal
    }

    pub fn form(&self) -> Option<&W::Form> {
        self.form.as_ref()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Drain queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    /// Open a modal, replacing any that is already open.
    ///
    /// `Edit` pre-populates the form from the target record and `Add`
    /// starts blank. Every kind except `Add` and `Import` needs a target
    /// that exists.
    pub fn open_modal(&mut self, kind: ModalKind, entity: W::Kind, target: Option<&str>) -> Result<()> {
        let form = match kind {
            ModalKind::Add => Some(W::blank_form(entity)),
            ModalKind::Import => None,
            ModalKind::Edit => Some(self.workspace.edit_form(entity, require_target(target)?)?),
            ModalKind::View | ModalKind::Delete => {
                self.workspace.entry(entity, require_target(target)?)?;
                None
            }
        };
        let target = match kind {
            ModalKind::Add | ModalKind::Import => None,
            _ => target.map(str::to_string),
        };
        tracing::debug!(modal = %kind, entity = %entity, target = ?target, "modal opened");
        self.modal = Modal::Open {
            kind,
            entity,
            target,
        };
        self.form = form;
        Ok(())
    }

    pub fn modal_kind(&self) -> Option<ModalKind> {
        match &self.modal {
            Modal::Open { kind, .. } => Some(*kind),
            Modal::Closed => None,
        }
    }

    /// Close the modal and discard the form.
    pub fn close_modal(&mut self) {
        self.modal = Modal::Closed;
        self.form = None;
    }

    /// `Escape` closes any modal. `Enter` confirms the open form or
    /// delete prompt and is ignored otherwise.
    pub fn handle_key(&mut self, key: Key) -> Result<()> {
        match key {
            Key::Escape => {
                self.close_modal();
                Ok(())
            }
            Key::Enter => match self.modal_kind() {
                Some(ModalKind::Add | ModalKind::Edit) => self.submit().map(|_| ()),
                Some(ModalKind::Delete) => self.confirm_delete().map(|_| ()),
                _ => Ok(()),
            },
        }
    }

    /// Set a field on the open form.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        self.form
            .as_mut()
            .ok_or(TrackbookError::NoActiveModal)?
            .set(field, value)
    }

    /// Validate and save the open form.
    ///
    /// On failure an error notice is queued, the modal stays open and
    /// nothing is written.
    pub fn submit(&mut self) -> Result<String> {
        let (entity, target) = match &self.modal {
            Modal::Open {
                kind: ModalKind::Add | ModalKind::Edit,
                entity,
                target,
            } => (*entity, target.clone()),
            _ => return Err(TrackbookError::NoActiveModal),
        };
        let form = self.form.as_ref().ok_or(TrackbookError::NoActiveModal)?;

        match self
            .workspace
            .submit(self.backend.as_mut(), form, target.as_deref())
        {
            Ok(id) => {
                let verb = if target.is_some() { "Updated" } else { "Added" };
                tracing::info!(app = %W::APP, entity = %entity, id = %id, "{} record", verb.to_lowercase());
                self.notices.push(Notice::Info(format!("{} {} record {}", verb, entity, id)));
                self.close_modal();
                Ok(id)
            }
            Err(e) => {
                tracing::debug!(entity = %entity, error = %e, "submit rejected");
                self.notices.push(Notice::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Delete the record the open delete modal targets.
    pub fn confirm_delete(&mut self) -> Result<DeleteReport> {
        let (entity, id) = match &self.modal {
            Modal::Open {
                kind: ModalKind::Delete,
                entity,
                target: Some(id),
            } => (*entity, id.clone()),
            _ => return Err(TrackbookError::NoActiveModal),
        };
        let report = self.workspace.delete(self.backend.as_mut(), entity, &id)?;
        tracing::info!(
            app = %W::APP,
            entity = %entity,
            id = %id,
            cascaded = report.cascaded,
            unlinked = report.unlinked,
            "deleted record"
        );
        self.notices.push(Notice::Info(format!("Deleted {}", report.label)));
        self.close_modal();
        Ok(report)
    }

    /// Import `text` into the collection the open import modal targets.
    pub fn import(&mut self, text: &str, format: Format) -> Result<usize> {
        let entity = match &self.modal {
            Modal::Open {
                kind: ModalKind::Import,
                entity,
                ..
            } => *entity,
            _ => return Err(TrackbookError::NoActiveModal),
        };
        let options = ImportOptions {
            format,
            dialect: self.dialect,
            policy: self.import_policy,
        };
        match self
            .workspace
            .import(self.backend.as_mut(), entity, text, &options)
        {
            Ok(count) => {
                self.notices
                    .push(Notice::Info(format!("Imported {} {} record(s)", count, entity)));
                self.close_modal();
                Ok(count)
            }
            Err(e) => {
                self.notices.push(Notice::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Shallow-merge `patch` into a record without going through a form.
    pub fn patch(&mut self, entity: W::Kind, id: &str, patch: &Patch) -> Result<String> {
        let id = self.workspace.patch(self.backend.as_mut(), entity, id, patch)?;
        tracing::info!(app = %W::APP, entity = %entity, id = %id, "patched record");
        self.notices.push(Notice::Info(format!("Updated {} record {}", entity, id)));
        Ok(id)
    }

    /// Flip the theme and persist it. Returns the new value.
    pub fn toggle_dark_mode(&mut self) -> Result<bool> {
        self.set_dark_mode(!self.dark_mode)
    }

    pub fn set_dark_mode(&mut self, enabled: bool) -> Result<bool> {
        save_dark_mode(self.backend.as_mut(), W::APP.dark_mode_key(), enabled)?;
        self.dark_mode = enabled;
        Ok(enabled)
    }

    /// Click a column header: same key toggles direction, a new key sorts
    /// ascending.
    pub fn select_sort(&mut self, key: &str) {
        self.sort.select(key);
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
    }

    pub fn set_query(&mut self, query: Query) {
        self.query = query;
    }

    pub fn clear_filters(&mut self) {
        self.query = Query::new();
        self.sort.clear();
    }

    /// Rows of a collection under the active query and sort.
    pub fn listing(&self, entity: W::Kind) -> Result<Vec<Entry>> {
        self.workspace.listing(entity, &self.query, &self.sort)
    }

    /// The record the open view modal targets.
    pub fn view(&self) -> Result<Entry> {
        match &self.modal {
            Modal::Open {
                kind: ModalKind::View,
                entity,
                target: Some(id),
            } => self.workspace.entry(*entity, id),
            _ => Err(TrackbookError::NoActiveModal),
        }
    }

    pub fn entry(&self, entity: W::Kind, id: &str) -> Result<Entry> {
        self.workspace.entry(entity, id)
    }

    pub fn export(&self, entity: W::Kind, format: Format) -> Result<String> {
        self.workspace.export(entity, format)
    }

    pub fn template(&self, entity: W::Kind) -> String {
        W::template(entity)
    }

    pub fn dashboard(&self) -> Vec<Stat> {
        self.workspace.dashboard()
    }
}

fn require_target(target: Option<&str>) -> Result<&str> {
    target.ok_or_else(|| ValidationError::required("id").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::workspace::inventory::InventoryKind;
    use crate::workspace::school::SchoolKind;
    use crate::workspace::{InventoryWorkspace, SchoolWorkspace};

    fn school() -> Controller<SchoolWorkspace> {
        Controller::open(Box::new(MemoryBackend::new()))
    }

    #[test]
    fn test_edit_prefills_form() {
        let mut ctl = school();
        ctl.open_modal(ModalKind::Edit, SchoolKind::Student, Some("student-1"))
            .unwrap();
        let fields = ctl.form().unwrap().fields();
        assert!(fields.contains(&("code", "S001".to_string())));
        assert!(ctl.modal().is_open());
    }

    #[test]
    fn test_open_missing_record_fails() {
        let mut ctl = school();
        let err = ctl
            .open_modal(ModalKind::Edit, SchoolKind::Student, Some("nope"))
            .unwrap_err();
        assert!(matches!(err, TrackbookError::RecordNotFound { .. }));
        assert_eq!(ctl.modal(), &Modal::Closed);
    }

    #[test]
    fn test_opening_replaces_modal() {
        let mut ctl = school();
        ctl.open_modal(ModalKind::Add, SchoolKind::Class, None).unwrap();
        ctl.open_modal(ModalKind::View, SchoolKind::Student, Some("student-2"))
            .unwrap();
        assert!(ctl.form().is_none());
        assert_eq!(ctl.view().unwrap().id, "student-2");
    }

    #[test]
    fn test_escape_closes_and_clears() {
        let mut ctl = school();
        ctl.open_modal(ModalKind::Add, SchoolKind::Class, None).unwrap();
        ctl.set_field("name", "Year 9 History").unwrap();
        ctl.handle_key(Key::Escape).unwrap();
        assert_eq!(ctl.modal(), &Modal::Closed);
        assert!(ctl.form().is_none());
        assert!(matches!(
            ctl.set_field("name", "x"),
            Err(TrackbookError::NoActiveModal)
        ));
    }

    #[test]
    fn test_invalid_submit_keeps_modal_and_writes_nothing() {
        let mut ctl = school();
        ctl.open_modal(ModalKind::Add, SchoolKind::Student, None).unwrap();
        ctl.set_field("name", "Dana").unwrap();
        assert!(ctl.submit().is_err());
        assert!(ctl.modal().is_open());
        assert!(matches!(ctl.notices().last(), Some(Notice::Error(_))));
        assert_eq!(ctl.workspace().students.len(), 3);
        // nothing persisted before the first successful write
        assert_eq!(ctl.backend().get("school.students").unwrap(), None);
    }

    #[test]
    fn test_enter_submits_form() {
        let mut ctl = school();
        ctl.open_modal(ModalKind::Add, SchoolKind::Student, None).unwrap();
        ctl.set_field("code", "S010").unwrap();
        ctl.set_field("name", "Dana Okafor").unwrap();
        ctl.handle_key(Key::Enter).unwrap();
        assert_eq!(ctl.modal(), &Modal::Closed);
        assert_eq!(ctl.workspace().students.len(), 4);
        assert!(ctl.backend().get("school.students").unwrap().is_some());
        assert!(matches!(ctl.take_notices().as_slice(), [Notice::Info(_)]));
        assert!(ctl.notices().is_empty());
    }

    #[test]
    fn test_delete_flow_cascades() {
        let mut ctl = school();
        ctl.open_modal(ModalKind::Delete, SchoolKind::Student, Some("student-1"))
            .unwrap();
        let report = ctl.confirm_delete().unwrap();
        assert_eq!(report.cascaded, 2);
        assert!(ctl
            .workspace()
            .progress
            .iter()
            .all(|r| r.student_id != "student-1"));
    }

    #[test]
    fn test_import_requires_modal() {
        let mut ctl = school();
        let csv = "Student ID,Full Name\nS004,New Student";
        assert!(matches!(
            ctl.import(csv, Format::Csv),
            Err(TrackbookError::NoActiveModal)
        ));
        ctl.open_modal(ModalKind::Import, SchoolKind::Student, None).unwrap();
        assert_eq!(ctl.import(csv, Format::Csv).unwrap(), 1);
        let student = ctl.workspace().students.records().last().unwrap();
        assert_eq!(student.code, "S004");
        assert_eq!(student.name, "New Student");
    }

    #[test]
    fn test_import_policy_override() {
        let mut ctl = school().with_import_settings(CsvDialect::Standard, Some(ImportPolicy::Lenient));
        ctl.open_modal(ModalKind::Import, SchoolKind::Student, None).unwrap();
        // no Student ID column: strict would reject the header
        assert_eq!(ctl.import("Full Name\nEve", Format::Csv).unwrap(), 1);
    }

    #[test]
    fn test_dark_mode_persists() {
        let mut backend = MemoryBackend::new();
        save_dark_mode(&mut backend, "inventory.dark_mode", true).unwrap();
        let mut ctl: Controller<InventoryWorkspace> = Controller::open(Box::new(backend));
        assert!(ctl.dark_mode());
        assert!(!ctl.toggle_dark_mode().unwrap());
        let (stored, _) = load_dark_mode(ctl.backend(), "inventory.dark_mode");
        assert!(!stored);
    }

    #[test]
    fn test_corrupt_theme_is_a_warning() {
        let mut backend = MemoryBackend::new();
        backend.set("inventory.dark_mode", "maybe").unwrap();
        let ctl: Controller<InventoryWorkspace> = Controller::open(Box::new(backend));
        assert!(!ctl.dark_mode());
        assert!(matches!(
            ctl.warnings(),
            [Warning::CorruptPreference { .. }]
        ));
    }

    #[test]
    fn test_sort_toggles_through_controller() {
        let mut ctl: Controller<InventoryWorkspace> = Controller::open(Box::new(MemoryBackend::new()));
        ctl.select_sort("quantity");
        let ascending: Vec<String> = ctl
            .listing(InventoryKind::Item)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        ctl.select_sort("quantity");
        let descending: Vec<String> = ctl
            .listing(InventoryKind::Item)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ascending, vec!["item-2", "item-4", "item-1", "item-3"]);
        let mut reversed = descending.clone();
        reversed.reverse();
        assert_eq!(reversed, ascending);
    }
}
