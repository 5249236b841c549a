//! Student progress tracking: classes, students and graded work.

use super::{
    choice, entry_for, export_from, import_into, json, number, optional_date, reference, required,
    required_reference, roll_back, save, unknown_field, AppKind, DeleteReport, EntityKind, Entry, FormState,
    ImportOptions, Stat, Workspace,
};
use crate::entity::school::{
    seed_classes, seed_progress, seed_students, AssessmentKind, ClassGroup, ProgressRecord, Student,
};
use crate::entity::{format_date, resolve_label, UNASSIGNED};
use crate::error::{Result, ValidationError};
use crate::storage::{Collection, KvBackend, Patch};
use crate::transfer::{self, Format, ImportPolicy};
use crate::view::{
    average, project, Aggregate, Filterable, Performance, Query, Rounding, Sentinel, SortState,
    SortValue, Sortable,
};
use crate::warnings::{check_references, Warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchoolKind {
    Class,
    Student,
    Progress,
}

impl EntityKind for SchoolKind {
    const ALL: &'static [Self] = &[SchoolKind::Class, SchoolKind::Student, SchoolKind::Progress];
}

impl std::fmt::Display for SchoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchoolKind::Class => write!(f, "classes"),
            SchoolKind::Student => write!(f, "students"),
            SchoolKind::Progress => write!(f, "progress"),
        }
    }
}

impl std::str::FromStr for SchoolKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "class" | "classes" => Ok(SchoolKind::Class),
            "student" | "students" => Ok(SchoolKind::Student),
            "progress" | "grades" => Ok(SchoolKind::Progress),
            _ => Err(format!(
                "Unknown collection '{}'. Valid collections: classes, students, progress",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassForm {
    pub name: String,
    pub teacher: String,
    pub room: String,
}

impl ClassForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "name" => &mut self.name,
            "teacher" => &mut self.teacher,
            "room" => &mut self.room,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("teacher", self.teacher.clone()),
            ("room", self.room.clone()),
        ]
    }

    fn validate(&self) -> std::result::Result<ClassGroup, ValidationError> {
        Ok(ClassGroup {
            id: String::new(),
            name: required("name", &self.name)?,
            teacher: crate::entity::non_blank(&self.teacher),
            room: crate::entity::non_blank(&self.room),
        })
    }
}

impl From<&ClassGroup> for ClassForm {
    fn from(class: &ClassGroup) -> Self {
        Self {
            name: class.name.clone(),
            teacher: class.teacher.clone().unwrap_or_default(),
            room: class.room.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentForm {
    pub code: String,
    pub name: String,
    pub email: String,
    pub class_id: String,
    pub enrolled_on: String,
}

impl StudentForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "code" => &mut self.code,
            "name" => &mut self.name,
            "email" => &mut self.email,
            "class_id" | "class" => &mut self.class_id,
            "enrolled_on" | "enrolled" => &mut self.enrolled_on,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("code", self.code.clone()),
            ("name", self.name.clone()),
            ("email", self.email.clone()),
            ("class_id", self.class_id.clone()),
            ("enrolled_on", self.enrolled_on.clone()),
        ]
    }

    fn validate(&self, classes: &Collection<ClassGroup>) -> std::result::Result<Student, ValidationError> {
        let email = crate::entity::non_blank(&self.email);
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(ValidationError::new("email", "must be an email address"));
            }
        }
        Ok(Student {
            id: String::new(),
            code: required("code", &self.code)?,
            name: required("name", &self.name)?,
            email,
            class_id: reference("class_id", &self.class_id, classes)?,
            enrolled_on: optional_date("enrolled_on", &self.enrolled_on)?,
        })
    }
}

impl From<&Student> for StudentForm {
    fn from(student: &Student) -> Self {
        Self {
            code: student.code.clone(),
            name: student.name.clone(),
            email: student.email.clone().unwrap_or_default(),
            class_id: student.class_id.clone().unwrap_or_default(),
            enrolled_on: format_date(student.enrolled_on),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressForm {
    pub student_id: String,
    pub subject: String,
    pub kind: String,
    pub score: String,
    pub max_points: String,
    pub recorded_on: String,
}

impl Default for ProgressForm {
    fn default() -> Self {
        Self {
            student_id: String::new(),
            subject: String::new(),
            kind: AssessmentKind::default().to_string(),
            score: String::new(),
            max_points: "100".to_string(),
            recorded_on: String::new(),
        }
    }
}

impl ProgressForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "student_id" | "student" => &mut self.student_id,
            "subject" => &mut self.subject,
            "type" | "kind" => &mut self.kind,
            "score" => &mut self.score,
            "max_points" => &mut self.max_points,
            "date" | "recorded_on" => &mut self.recorded_on,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("student_id", self.student_id.clone()),
            ("subject", self.subject.clone()),
            ("type", self.kind.clone()),
            ("score", self.score.clone()),
            ("max_points", self.max_points.clone()),
            ("date", self.recorded_on.clone()),
        ]
    }

    fn validate(&self, students: &Collection<Student>) -> std::result::Result<ProgressRecord, ValidationError> {
        let student_id = required_reference("student_id", &self.student_id, students)?;
        let subject = required("subject", &self.subject)?;
        let kind = choice("type", &self.kind)?;
        let max_points: f64 = number("max_points", &self.max_points)?;
        if !max_points.is_finite() || max_points <= 0.0 {
            return Err(ValidationError::new("max_points", "must be greater than 0"));
        }
        let score: f64 = number("score", &self.score)?;
        if !(0.0..=max_points).contains(&score) {
            return Err(ValidationError::new(
                "score",
                format!("must be between 0 and {}", max_points),
            ));
        }
        Ok(ProgressRecord {
            id: String::new(),
            student_id,
            subject,
            kind,
            score,
            max_points,
            recorded_on: optional_date("date", &self.recorded_on)?,
        })
    }
}

impl From<&ProgressRecord> for ProgressForm {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            student_id: record.student_id.clone(),
            subject: record.subject.clone(),
            kind: record.kind.to_string(),
            score: record.score.to_string(),
            max_points: record.max_points.to_string(),
            recorded_on: format_date(record.recorded_on),
        }
    }
}

/// Form state, one variant per entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchoolForm {
    Class(ClassForm),
    Student(StudentForm),
    Progress(ProgressForm),
}

impl FormState for SchoolForm {
    type Kind = SchoolKind;

    fn kind(&self) -> SchoolKind {
        match self {
            SchoolForm::Class(_) => SchoolKind::Class,
            SchoolForm::Student(_) => SchoolKind::Student,
            SchoolForm::Progress(_) => SchoolKind::Progress,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        match self {
            SchoolForm::Class(form) => form.set(field, value),
            SchoolForm::Student(form) => form.set(field, value),
            SchoolForm::Progress(form) => form.set(field, value),
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            SchoolForm::Class(form) => form.fields(),
            SchoolForm::Student(form) => form.fields(),
            SchoolForm::Progress(form) => form.fields(),
        }
    }
}

/// A student with their derived standing.
#[derive(Debug, Clone)]
pub struct StudentSummary<'a> {
    pub student: &'a Student,
    pub class_name: &'a str,
    pub average: Aggregate,
    pub performance: Performance,
    pub assessments: usize,
}

impl Filterable for StudentSummary<'_> {
    const FACETS: &'static [&'static str] = &["class", "performance"];

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.student.name.as_str(), self.student.code.as_str()];
        fields.extend(self.student.email.as_deref());
        fields
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "class" => self.student.class_id.clone(),
            "performance" => Some(self.performance.to_string()),
            _ => None,
        }
    }
}

impl Sortable for StudentSummary<'_> {
    const SORT_KEYS: &'static [&'static str] = &["code", "name", "class", "average", "enrolled"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "code" => SortValue::text(&self.student.code),
            "class" => SortValue::text(self.class_name),
            "average" => self.average.value().map(SortValue::Number).unwrap_or(SortValue::Missing),
            "enrolled" => match self.student.enrolled_on {
                Some(d) => SortValue::owned(format_date(Some(d))),
                None => SortValue::Missing,
            },
            _ => SortValue::text(&self.student.name),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchoolWorkspace {
    pub classes: Collection<ClassGroup>,
    pub students: Collection<Student>,
    pub progress: Collection<ProgressRecord>,
}

impl SchoolWorkspace {
    const ROUNDING: Rounding = Rounding::Integer;

    /// Mean percentage across a student's graded work.
    pub fn student_average(&self, student_id: &str) -> Aggregate {
        average(
            self.progress
                .iter()
                .filter(|r| r.student_id == student_id)
                .filter_map(ProgressRecord::percentage),
            Self::ROUNDING,
            Self::SENTINEL,
        )
    }

    pub fn summarize<'a>(&'a self, student: &'a Student) -> StudentSummary<'a> {
        let average = self.student_average(&student.id);
        StudentSummary {
            student,
            class_name: resolve_label(self.classes.records(), student.class_id.as_deref(), |c| &c.name),
            average,
            performance: Performance::from_average(average),
            assessments: self
                .progress
                .iter()
                .filter(|r| r.student_id == student.id)
                .count(),
        }
    }

    fn student_name(&self, id: &str) -> &str {
        resolve_label(self.students.records(), Some(id), |s| &s.name)
    }

    fn class_entry(&self, class: &ClassGroup) -> Result<Entry> {
        let enrolled = self
            .students
            .iter()
            .filter(|s| s.class_id.as_deref() == Some(class.id.as_str()))
            .count();
        let summary = format!(
            "{} | {} | room {} | {} student(s)",
            class.name,
            class.teacher.as_deref().unwrap_or(UNASSIGNED),
            class.room.as_deref().unwrap_or("-"),
            enrolled
        );
        entry_for(class, summary, &[("students", json(enrolled))])
    }

    fn student_entry(&self, summary: &StudentSummary<'_>) -> Result<Entry> {
        let line = format!(
            "{} {} | {} | avg {} ({})",
            summary.student.code,
            summary.student.name,
            summary.class_name,
            summary.average,
            summary.performance
        );
        entry_for(
            summary.student,
            line,
            &[
                ("class_name", json(summary.class_name)),
                ("average", json(summary.average)),
                ("performance", json(summary.performance)),
                ("assessments", json(summary.assessments)),
            ],
        )
    }

    fn progress_entry(&self, record: &ProgressRecord) -> Result<Entry> {
        let percent = record.percentage();
        let summary = format!(
            "{} | {} {} | {}/{} ({}) | {}",
            self.student_name(&record.student_id),
            record.subject,
            record.kind,
            record.score,
            record.max_points,
            percent
                .map(|p| format!("{}%", Self::ROUNDING.apply(p)))
                .unwrap_or_else(|| "N/A".to_string()),
            format_date(record.recorded_on)
        );
        entry_for(
            record,
            summary,
            &[
                ("student_name", json(self.student_name(&record.student_id))),
                ("percentage", json(percent.map(|p| Self::ROUNDING.apply(p)))),
            ],
        )
    }
}

impl Workspace for SchoolWorkspace {
    type Kind = SchoolKind;
    type Form = SchoolForm;

    const APP: AppKind = AppKind::School;
    const IMPORT_POLICY: ImportPolicy = ImportPolicy::Strict;
    const SENTINEL: Sentinel = Sentinel::Missing;

    fn load(backend: &mut dyn KvBackend) -> (Self, Vec<Warning>) {
        let (classes, w1) = Collection::load(backend, seed_classes);
        let (students, w2) = Collection::load(backend, seed_students);
        let (progress, w3) = Collection::load(backend, seed_progress);
        let mut warnings: Vec<Warning> = [w1, w2, w3].into_iter().flatten().collect();

        warnings.extend(check_references(
            "student",
            "class_id",
            students.iter().filter_map(|s: &Student| s.class_id.as_deref()),
            |id| classes.contains(id),
        ));
        warnings.extend(check_references(
            "progress",
            "student_id",
            progress.iter().map(|r: &ProgressRecord| r.student_id.as_str()),
            |id| students.contains(id),
        ));

        (
            Self {
                classes,
                students,
                progress,
            },
            warnings,
        )
    }

    fn blank_form(kind: SchoolKind) -> SchoolForm {
        match kind {
            SchoolKind::Class => SchoolForm::Class(ClassForm::default()),
            SchoolKind::Student => SchoolForm::Student(StudentForm::default()),
            SchoolKind::Progress => SchoolForm::Progress(ProgressForm::default()),
        }
    }

    fn edit_form(&self, kind: SchoolKind, id: &str) -> Result<SchoolForm> {
        Ok(match kind {
            SchoolKind::Class => SchoolForm::Class(self.classes.require(id)?.into()),
            SchoolKind::Student => SchoolForm::Student(self.students.require(id)?.into()),
            SchoolKind::Progress => SchoolForm::Progress(self.progress.require(id)?.into()),
        })
    }

    fn submit(
        &mut self,
        backend: &mut dyn KvBackend,
        form: &SchoolForm,
        target: Option<&str>,
    ) -> Result<String> {
        match form {
            SchoolForm::Class(form) => {
                let class = form.validate()?;
                save(&mut self.classes, backend, class, target)
            }
            SchoolForm::Student(form) => {
                let student = form.validate(&self.classes)?;
                save(&mut self.students, backend, student, target)
            }
            SchoolForm::Progress(form) => {
                let record = form.validate(&self.students)?;
                save(&mut self.progress, backend, record, target)
            }
        }
    }

    fn patch(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: SchoolKind,
        id: &str,
        patch: &Patch,
    ) -> Result<String> {
        match kind {
            SchoolKind::Class => self.classes.update(backend, id, patch).map(|r| r.id),
            SchoolKind::Student => self.students.update(backend, id, patch).map(|r| r.id),
            SchoolKind::Progress => self.progress.update(backend, id, patch).map(|r| r.id),
        }
    }

    /// Students take their progress records with them; a deleted class
    /// leaves its students unassigned.
    fn delete(&mut self, backend: &mut dyn KvBackend, kind: SchoolKind, id: &str) -> Result<DeleteReport> {
        match kind {
            SchoolKind::Class => {
                self.classes.require(id)?;
                let students_before = self.students.snapshot();
                let unlinked = self.students.update_where(
                    backend,
                    |s| s.class_id.as_deref() == Some(id),
                    |s| s.class_id = None,
                )?;
                let class = match self.classes.delete(backend, id) {
                    Ok(class) => class,
                    Err(e) => {
                        roll_back(&mut self.students, backend, students_before);
                        return Err(e);
                    }
                };
                Ok(DeleteReport {
                    label: class.name,
                    cascaded: 0,
                    unlinked,
                })
            }
            SchoolKind::Student => {
                self.students.require(id)?;
                let progress_before = self.progress.snapshot();
                let cascaded = self.progress.remove_where(backend, |r| r.student_id == id)?;
                let student = match self.students.delete(backend, id) {
                    Ok(student) => student,
                    Err(e) => {
                        roll_back(&mut self.progress, backend, progress_before);
                        return Err(e);
                    }
                };
                Ok(DeleteReport {
                    label: student.name,
                    cascaded,
                    unlinked: 0,
                })
            }
            SchoolKind::Progress => {
                let record = self.progress.delete(backend, id)?;
                Ok(DeleteReport {
                    label: format!("{} {}", record.subject, record.kind),
                    ..DeleteReport::default()
                })
            }
        }
    }

    fn import(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: SchoolKind,
        text: &str,
        options: &ImportOptions,
    ) -> Result<usize> {
        match kind {
            SchoolKind::Class => import_into(&mut self.classes, backend, text, options),
            SchoolKind::Student => import_into(&mut self.students, backend, text, options),
            SchoolKind::Progress => import_into(&mut self.progress, backend, text, options),
        }
    }

    fn export(&self, kind: SchoolKind, format: Format) -> Result<String> {
        match kind {
            SchoolKind::Class => export_from(&self.classes, format),
            SchoolKind::Student => export_from(&self.students, format),
            SchoolKind::Progress => export_from(&self.progress, format),
        }
    }

    fn template(kind: SchoolKind) -> String {
        match kind {
            SchoolKind::Class => transfer::template::<ClassGroup>(),
            SchoolKind::Student => transfer::template::<Student>(),
            SchoolKind::Progress => transfer::template::<ProgressRecord>(),
        }
    }

    fn listing(&self, kind: SchoolKind, query: &Query, sort: &SortState) -> Result<Vec<Entry>> {
        match kind {
            SchoolKind::Class => project(self.classes.records(), query, sort)?
                .into_iter()
                .map(|c| self.class_entry(c))
                .collect(),
            SchoolKind::Student => {
                let summaries: Vec<_> = self.students.iter().map(|s| self.summarize(s)).collect();
                project(&summaries, query, sort)?
                    .into_iter()
                    .map(|s| self.student_entry(s))
                    .collect()
            }
            SchoolKind::Progress => project(self.progress.records(), query, sort)?
                .into_iter()
                .map(|r| self.progress_entry(r))
                .collect(),
        }
    }

    fn entry(&self, kind: SchoolKind, id: &str) -> Result<Entry> {
        match kind {
            SchoolKind::Class => self.class_entry(self.classes.require(id)?),
            SchoolKind::Student => self.student_entry(&self.summarize(self.students.require(id)?)),
            SchoolKind::Progress => self.progress_entry(self.progress.require(id)?),
        }
    }

    fn dashboard(&self) -> Vec<Stat> {
        let overall = average(
            self.progress.iter().filter_map(ProgressRecord::percentage),
            Self::ROUNDING,
            Self::SENTINEL,
        );
        let summaries: Vec<_> = self.students.iter().map(|s| self.summarize(s)).collect();
        let in_band = |band: Performance| summaries.iter().filter(|s| s.performance == band).count();

        vec![
            Stat::new("Classes", self.classes.len()),
            Stat::new("Students", self.students.len()),
            Stat::new("Assessments", self.progress.len()),
            Stat::new("Average score", overall),
            Stat::new("Excellent", in_band(Performance::Excellent)),
            Stat::new("Needs improvement", in_band(Performance::NeedsImprovement)),
            Stat::new("No data", in_band(Performance::NoData)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FailingBackend, MemoryBackend};
    use crate::transfer::CsvDialect;
    use crate::view::parse_query;

    fn workspace() -> (SchoolWorkspace, MemoryBackend) {
        let mut backend = MemoryBackend::new();
        let (ws, warnings) = SchoolWorkspace::load(&mut backend);
        assert!(warnings.is_empty());
        (ws, backend)
    }

    fn strict_csv() -> ImportOptions {
        ImportOptions {
            format: Format::Csv,
            dialect: CsvDialect::Standard,
            policy: ImportPolicy::Strict,
        }
    }

    #[test]
    fn test_student_average_and_band() {
        let (ws, _) = workspace();
        // 92/100 and 18/20
        assert_eq!(ws.student_average("student-1"), Aggregate::Value(91.0));
        let alice = ws.students.get("student-1").unwrap();
        assert_eq!(ws.summarize(alice).performance, Performance::Excellent);
        // 68/100 and 35/50
        assert_eq!(ws.student_average("student-2"), Aggregate::Value(69.0));
    }

    #[test]
    fn test_average_without_records_is_missing() {
        let (ws, _) = workspace();
        assert_eq!(ws.student_average("nobody"), Aggregate::Missing);
    }

    #[test]
    fn test_zero_max_points_is_skipped() {
        let (mut ws, mut backend) = workspace();
        let id = ws.progress.records()[0].id.clone();
        let patch = serde_json::json!({"max_points": 0.0});
        ws.patch(&mut backend, SchoolKind::Progress, &id, patch.as_object().unwrap())
            .unwrap();
        // only the 18/20 quiz remains
        assert_eq!(ws.student_average("student-1"), Aggregate::Value(90.0));
    }

    #[test]
    fn test_delete_student_cascades_progress() {
        let (mut ws, mut backend) = workspace();
        let report = ws.delete(&mut backend, SchoolKind::Student, "student-1").unwrap();
        assert_eq!(report.cascaded, 2);
        assert!(ws.progress.iter().all(|r| r.student_id != "student-1"));

        let (reloaded, _) = SchoolWorkspace::load(&mut backend);
        assert_eq!(reloaded.progress.len(), 3);
    }

    #[test]
    fn test_failed_progress_write_keeps_student() {
        let mut backend = FailingBackend::failing_on("school.progress");
        let (mut ws, _) = SchoolWorkspace::load(&mut backend);

        assert!(ws.delete(&mut backend, SchoolKind::Student, "student-1").is_err());
        assert!(ws.students.contains("student-1"));
        assert_eq!(ws.progress.iter().filter(|r| r.student_id == "student-1").count(), 2);

        let (reloaded, warnings) = SchoolWorkspace::load(&mut backend);
        assert!(warnings.is_empty());
        assert!(reloaded.students.contains("student-1"));
    }

    #[test]
    fn test_failed_student_write_restores_progress() {
        let mut backend = FailingBackend::failing_on("school.students");
        let (mut ws, _) = SchoolWorkspace::load(&mut backend);

        assert!(ws.delete(&mut backend, SchoolKind::Student, "student-1").is_err());
        assert!(ws.students.contains("student-1"));
        assert_eq!(ws.progress.len(), 5);

        let (reloaded, warnings) = SchoolWorkspace::load(&mut backend);
        assert!(warnings.is_empty());
        assert_eq!(
            reloaded.progress.iter().filter(|r| r.student_id == "student-1").count(),
            2
        );
    }

    #[test]
    fn test_failed_class_write_restores_assignments() {
        let mut backend = FailingBackend::failing_on("school.classes");
        let (mut ws, _) = SchoolWorkspace::load(&mut backend);

        assert!(ws.delete(&mut backend, SchoolKind::Class, "class-1").is_err());
        let (reloaded, _) = SchoolWorkspace::load(&mut backend);
        assert_eq!(
            reloaded.students.get("student-2").unwrap().class_id.as_deref(),
            Some("class-1")
        );
    }

    #[test]
    fn test_delete_class_unsets_students() {
        let (mut ws, mut backend) = workspace();
        let report = ws.delete(&mut backend, SchoolKind::Class, "class-1").unwrap();
        assert_eq!(report.unlinked, 2);
        assert_eq!(ws.students.len(), 3);
        let bob = ws.summarize(ws.students.get("student-2").unwrap());
        assert_eq!(bob.class_name, UNASSIGNED);
    }

    #[test]
    fn test_import_appends_student() {
        let (mut ws, mut backend) = workspace();
        let added = ws
            .import(
                &mut backend,
                SchoolKind::Student,
                "Student ID,Full Name\nS004,New Student",
                &strict_csv(),
            )
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(ws.students.len(), 4);
        let last = ws.students.records().last().unwrap();
        assert_eq!(last.code, "S004");
        assert_eq!(last.name, "New Student");
    }

    #[test]
    fn test_strict_import_commits_nothing_on_error() {
        let (mut ws, mut backend) = workspace();
        let err = ws.import(
            &mut backend,
            SchoolKind::Progress,
            "Student,Subject,Score,Max Points\nstudent-1,Maths,9,10\nstudent-1,Maths,x,10\n",
            &strict_csv(),
        );
        assert!(err.is_err());
        assert_eq!(ws.progress.len(), 5);
    }

    #[test]
    fn test_submit_validates_progress() {
        let (mut ws, mut backend) = workspace();
        let mut form = SchoolWorkspace::blank_form(SchoolKind::Progress);
        form.set("student_id", "student-3").unwrap();
        form.set("subject", "Science").unwrap();
        form.set("score", "120").unwrap();

        let err = ws.submit(&mut backend, &form, None).unwrap_err();
        assert!(err.to_string().starts_with("score:"));
        assert_eq!(ws.progress.len(), 5);

        form.set("score", "75").unwrap();
        let id = ws.submit(&mut backend, &form, None).unwrap();
        assert_eq!(ws.progress.get(&id).unwrap().score, 75.0);
    }

    #[test]
    fn test_submit_rejects_unknown_class() {
        let (mut ws, mut backend) = workspace();
        let mut form = SchoolWorkspace::blank_form(SchoolKind::Student);
        form.set("code", "S010").unwrap();
        form.set("name", "Dee").unwrap();
        form.set("class_id", "class-9").unwrap();
        assert!(ws.submit(&mut backend, &form, None).is_err());
    }

    #[test]
    fn test_edit_form_round_trip() {
        let (mut ws, mut backend) = workspace();
        let mut form = ws.edit_form(SchoolKind::Student, "student-2").unwrap();
        assert!(form.fields().contains(&("code", "S002".to_string())));
        form.set("name", "Benjamin Carter").unwrap();
        let id = ws.submit(&mut backend, &form, Some("student-2")).unwrap();
        assert_eq!(id, "student-2");
        assert_eq!(ws.students.get("student-2").unwrap().name, "Benjamin Carter");
        assert_eq!(ws.students.len(), 3);
    }

    #[test]
    fn test_listing_sorted_by_average() {
        let (ws, _) = workspace();
        let mut sort = SortState::new();
        sort.select("average");
        sort.select("average");
        let rows = ws.listing(SchoolKind::Student, &Query::new(), &sort).unwrap();
        let ids: Vec<_> = rows.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["student-1", "student-3", "student-2"]);
        assert_eq!(rows[0].detail["performance"], "Excellent");
    }

    #[test]
    fn test_listing_filters_by_class() {
        let (ws, _) = workspace();
        let rows = ws
            .listing(SchoolKind::Student, &parse_query("class:class-2"), &SortState::new())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].detail["class_name"], "Year 8 Science");
    }

    #[test]
    fn test_dashboard_sentinel() {
        let mut backend = MemoryBackend::new();
        let (mut ws, _) = SchoolWorkspace::load(&mut backend);
        ws.progress.remove_where(&mut backend, |_| true).unwrap();
        let stats = ws.dashboard();
        let avg = stats.iter().find(|s| s.label == "Average score").unwrap();
        assert_eq!(avg.value, "N/A");
    }
}
