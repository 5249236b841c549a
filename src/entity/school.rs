use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{format_date, parse_date, Record};
use crate::error::ImportError;
use crate::transfer::{CsvRecord, Row};
use crate::view::{percentage, Filterable, SortValue, Sortable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub teacher: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    /// School-issued identifier, e.g. `S001`. Distinct from the record id.
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub enrolled_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Exam,
    Quiz,
    #[default]
    Assignment,
    Project,
}

impl std::fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssessmentKind::Exam => write!(f, "exam"),
            AssessmentKind::Quiz => write!(f, "quiz"),
            AssessmentKind::Assignment => write!(f, "assignment"),
            AssessmentKind::Project => write!(f, "project"),
        }
    }
}

impl std::str::FromStr for AssessmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exam" | "test" => Ok(AssessmentKind::Exam),
            "quiz" => Ok(AssessmentKind::Quiz),
            "assignment" | "homework" => Ok(AssessmentKind::Assignment),
            "project" => Ok(AssessmentKind::Project),
            _ => Err(format!("Invalid assessment type: {}", s)),
        }
    }
}

/// One graded piece of work for a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: String,
    pub student_id: String,
    pub subject: String,
    #[serde(default)]
    pub kind: AssessmentKind,
    pub score: f64,
    pub max_points: f64,
    #[serde(default)]
    pub recorded_on: Option<NaiveDate>,
}

impl ProgressRecord {
    /// Score as a percentage of `max_points`; `None` when `max_points` is
    /// not positive.
    pub fn percentage(&self) -> Option<f64> {
        percentage(self.score, self.max_points)
    }
}

impl Record for ClassGroup {
    const KEY: &'static str = "school.classes";
    const LABEL: &'static str = "class";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Record for Student {
    const KEY: &'static str = "school.students";
    const LABEL: &'static str = "student";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Record for ProgressRecord {
    const KEY: &'static str = "school.progress";
    const LABEL: &'static str = "progress";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl CsvRecord for ClassGroup {
    const COLUMNS: &'static [&'static str] = &["Class Name", "Teacher", "Room"];
    const REQUIRED: &'static [&'static str] = &["Class Name"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.teacher.clone().unwrap_or_default(),
            self.room.clone().unwrap_or_default(),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(ClassGroup {
            id: String::new(),
            name: row.required("Class Name", "Unnamed class")?,
            teacher: row.text("Teacher"),
            room: row.text("Room"),
        })
    }
}

impl CsvRecord for Student {
    const COLUMNS: &'static [&'static str] =
        &["Student ID", "Full Name", "Email", "Class ID", "Enrolled On"];
    const REQUIRED: &'static [&'static str] = &["Student ID", "Full Name"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.code.clone(),
            self.name.clone(),
            self.email.clone().unwrap_or_default(),
            self.class_id.clone().unwrap_or_default(),
            format_date(self.enrolled_on),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Student {
            id: String::new(),
            code: row.required("Student ID", "")?,
            name: row.required("Full Name", "Unnamed student")?,
            email: row.text("Email"),
            class_id: row.text("Class ID"),
            enrolled_on: row.date("Enrolled On")?,
        })
    }
}

impl CsvRecord for ProgressRecord {
    const COLUMNS: &'static [&'static str] =
        &["Student", "Subject", "Type", "Score", "Max Points", "Date"];
    const REQUIRED: &'static [&'static str] = &["Student", "Subject", "Score", "Max Points"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.student_id.clone(),
            self.subject.clone(),
            self.kind.to_string(),
            self.score.to_string(),
            self.max_points.to_string(),
            format_date(self.recorded_on),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(ProgressRecord {
            id: String::new(),
            student_id: row.required("Student", "")?,
            subject: row.required("Subject", "General")?,
            kind: row.choice("Type")?,
            score: row.required_number("Score", 0.0)?,
            max_points: row.required_number("Max Points", 100.0)?,
            recorded_on: row.date("Date")?,
        })
    }
}

impl Filterable for ClassGroup {
    const FACETS: &'static [&'static str] = &["teacher"];

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.teacher.as_deref());
        fields.extend(self.room.as_deref());
        fields
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "teacher" => self.teacher.clone(),
            _ => None,
        }
    }
}

impl Sortable for ClassGroup {
    const SORT_KEYS: &'static [&'static str] = &["name", "teacher", "room"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "teacher" => SortValue::opt_text(self.teacher.as_deref()),
            "room" => SortValue::opt_text(self.room.as_deref()),
            _ => SortValue::text(&self.name),
        }
    }
}

impl Filterable for ProgressRecord {
    const FACETS: &'static [&'static str] = &["student", "subject", "type"];

    fn search_fields(&self) -> Vec<&str> {
        vec![self.subject.as_str()]
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "student" => Some(self.student_id.clone()),
            "subject" => Some(self.subject.clone()),
            "type" => Some(self.kind.to_string()),
            _ => None,
        }
    }
}

impl Sortable for ProgressRecord {
    const SORT_KEYS: &'static [&'static str] = &["subject", "type", "score", "percentage", "date"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "type" => SortValue::owned(self.kind.to_string()),
            "score" => SortValue::Number(self.score),
            "percentage" => self
                .percentage()
                .map(SortValue::Number)
                .unwrap_or(SortValue::Missing),
            "date" => self
                .recorded_on
                .map(|d| SortValue::owned(format_date(Some(d))))
                .unwrap_or(SortValue::Missing),
            _ => SortValue::text(&self.subject),
        }
    }
}

/// Seed classes shown on first run.
pub fn seed_classes() -> Vec<ClassGroup> {
    vec![
        ClassGroup {
            id: "class-1".to_string(),
            name: "Year 7 Mathematics".to_string(),
            teacher: Some("Ms. Patel".to_string()),
            room: Some("B12".to_string()),
        },
        ClassGroup {
            id: "class-2".to_string(),
            name: "Year 8 Science".to_string(),
            teacher: Some("Mr. Okafor".to_string()),
            room: Some("Lab 2".to_string()),
        },
    ]
}

pub fn seed_students() -> Vec<Student> {
    let student = |id: &str, code: &str, name: &str, email: &str, class: &str, enrolled: &str| Student {
        id: id.to_string(),
        code: code.to_string(),
        name: name.to_string(),
        email: Some(email.to_string()),
        class_id: Some(class.to_string()),
        enrolled_on: parse_date(enrolled),
    };
    vec![
        student("student-1", "S001", "Alice Johnson", "alice@school.test", "class-1", "2024-09-02"),
        student("student-2", "S002", "Ben Carter", "ben@school.test", "class-1", "2024-09-02"),
        student("student-3", "S003", "Chloe Nguyen", "chloe@school.test", "class-2", "2024-09-03"),
    ]
}

pub fn seed_progress() -> Vec<ProgressRecord> {
    let record = |id: &str, student: &str, subject: &str, kind, score, max, date: &str| ProgressRecord {
        id: id.to_string(),
        student_id: student.to_string(),
        subject: subject.to_string(),
        kind,
        score,
        max_points: max,
        recorded_on: parse_date(date),
    };
    vec![
        record("progress-1", "student-1", "Mathematics", AssessmentKind::Exam, 92.0, 100.0, "2024-10-14"),
        record("progress-2", "student-1", "Mathematics", AssessmentKind::Quiz, 18.0, 20.0, "2024-10-21"),
        record("progress-3", "student-2", "Mathematics", AssessmentKind::Exam, 68.0, 100.0, "2024-10-14"),
        record("progress-4", "student-2", "English", AssessmentKind::Assignment, 35.0, 50.0, "2024-10-18"),
        record("progress-5", "student-3", "Science", AssessmentKind::Project, 81.0, 100.0, "2024-10-25"),
    ]
}
