use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{format_date, parse_date, Record};
use crate::error::ImportError;
use crate::transfer::{CsvRecord, Row};
use crate::view::{Filterable, SortValue, Sortable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SprintStatus {
    #[default]
    Planned,
    Active,
    Completed,
}

impl std::fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SprintStatus::Planned => write!(f, "planned"),
            SprintStatus::Active => write!(f, "active"),
            SprintStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for SprintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planned" => Ok(SprintStatus::Planned),
            "active" => Ok(SprintStatus::Active),
            "completed" | "closed" => Ok(SprintStatus::Completed),
            _ => Err(format!("Invalid sprint status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "todo" | "to-do" => Ok(TaskStatus::Todo),
            "in-progress" | "inprogress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    fn rank(self) -> f64 {
        match self {
            Priority::Low => 0.0,
            Priority::Medium => 1.0,
            Priority::High => 2.0,
            Priority::Critical => 3.0,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "normal" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" | "urgent" => Ok(Priority::Critical),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub starts_on: Option<NaiveDate>,
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
    #[serde(default)]
    pub status: SprintStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub story_points: u32,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub sprint_id: Option<String>,
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
}

impl Record for Sprint {
    const KEY: &'static str = "agile.sprints";
    const LABEL: &'static str = "sprint";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Record for Task {
    const KEY: &'static str = "agile.tasks";
    const LABEL: &'static str = "task";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl CsvRecord for Sprint {
    const COLUMNS: &'static [&'static str] = &["Name", "Goal", "Start Date", "End Date", "Status"];
    const REQUIRED: &'static [&'static str] = &["Name"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.goal.clone().unwrap_or_default(),
            format_date(self.starts_on),
            format_date(self.ends_on),
            self.status.to_string(),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Sprint {
            id: String::new(),
            name: row.required("Name", "Unnamed sprint")?,
            goal: row.text("Goal"),
            starts_on: row.date("Start Date")?,
            ends_on: row.date("End Date")?,
            status: row.choice("Status")?,
        })
    }
}

impl CsvRecord for Task {
    const COLUMNS: &'static [&'static str] = &[
        "Title",
        "Description",
        "Status",
        "Priority",
        "Story Points",
        "Assignee",
        "Sprint ID",
        "Due Date",
    ];
    const REQUIRED: &'static [&'static str] = &["Title"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.description.clone().unwrap_or_default(),
            self.status.to_string(),
            self.priority.to_string(),
            self.story_points.to_string(),
            self.assignee.clone().unwrap_or_default(),
            self.sprint_id.clone().unwrap_or_default(),
            format_date(self.due_on),
        ]
    }

    fn from_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(Task {
            id: String::new(),
            title: row.required("Title", "Untitled task")?,
            description: row.text("Description"),
            status: row.choice("Status")?,
            priority: row.choice("Priority")?,
            story_points: row.number("Story Points", 0)?,
            assignee: row.text("Assignee"),
            sprint_id: row.text("Sprint ID"),
            due_on: row.date("Due Date")?,
        })
    }
}

impl Filterable for Sprint {
    const FACETS: &'static [&'static str] = &["status"];

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.goal.as_deref());
        fields
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "status" => Some(self.status.to_string()),
            _ => None,
        }
    }
}

impl Sortable for Sprint {
    const SORT_KEYS: &'static [&'static str] = &["name", "start", "end", "status"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "start" => date_value(self.starts_on),
            "end" => date_value(self.ends_on),
            "status" => SortValue::owned(self.status.to_string()),
            _ => SortValue::text(&self.name),
        }
    }
}

impl Filterable for Task {
    const FACETS: &'static [&'static str] = &["status", "priority", "assignee", "sprint"];

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str()];
        fields.extend(self.description.as_deref());
        fields.extend(self.assignee.as_deref());
        fields
    }

    fn facet(&self, name: &str) -> Option<String> {
        match name {
            "status" => Some(self.status.to_string()),
            "priority" => Some(self.priority.to_string()),
            "assignee" => self.assignee.clone(),
            "sprint" => self.sprint_id.clone(),
            _ => None,
        }
    }
}

impl Sortable for Task {
    const SORT_KEYS: &'static [&'static str] =
        &["title", "status", "priority", "points", "assignee", "due"];

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "status" => SortValue::owned(self.status.to_string()),
            // By severity rather than by name.
            "priority" => SortValue::Number(self.priority.rank()),
            "points" => SortValue::Number(self.story_points as f64),
            "assignee" => SortValue::opt_text(self.assignee.as_deref()),
            "due" => date_value(self.due_on),
            _ => SortValue::text(&self.title),
        }
    }
}

fn date_value(date: Option<NaiveDate>) -> SortValue<'static> {
    match date {
        Some(d) => SortValue::owned(format_date(Some(d))),
        None => SortValue::Missing,
    }
}

pub fn seed_sprints() -> Vec<Sprint> {
    vec![
        Sprint {
            id: "sprint-1".to_string(),
            name: "Sprint 1".to_string(),
            goal: Some("Ship the login flow".to_string()),
            starts_on: parse_date("2024-10-07"),
            ends_on: parse_date("2024-10-18"),
            status: SprintStatus::Completed,
        },
        Sprint {
            id: "sprint-2".to_string(),
            name: "Sprint 2".to_string(),
            goal: Some("Reporting dashboard".to_string()),
            starts_on: parse_date("2024-10-21"),
            ends_on: parse_date("2024-11-01"),
            status: SprintStatus::Active,
        },
    ]
}

pub fn seed_tasks() -> Vec<Task> {
    let task = |id: &str, title: &str, status, priority, points, assignee: &str, sprint: &str| Task {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        status,
        priority,
        story_points: points,
        assignee: Some(assignee.to_string()),
        sprint_id: Some(sprint.to_string()),
        due_on: None,
    };
    vec![
        task("task-1", "Design login screen", TaskStatus::Done, Priority::High, 3, "Priya", "sprint-1"),
        task("task-2", "Password reset API", TaskStatus::Done, Priority::Medium, 5, "Marco", "sprint-1"),
        task("task-3", "Chart component", TaskStatus::InProgress, Priority::High, 8, "Priya", "sprint-2"),
        task("task-4", "Export report as CSV", TaskStatus::Todo, Priority::Low, 2, "Marco", "sprint-2"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{import_csv, CsvDialect, ImportPolicy};

    #[test]
    fn test_task_status_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::InProgress.to_string(), "in-progress");
        assert!("blocked".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_priority_sorts_by_severity() {
        let tasks = seed_tasks();
        assert!(matches!(
            (tasks[3].sort_value("priority"), tasks[0].sort_value("priority")),
            (SortValue::Number(low), SortValue::Number(high)) if low < high
        ));
    }

    #[test]
    fn test_strict_import_rejects_out_of_set_status() {
        let err = import_csv::<Task>(
            "Title,Status\nWrite docs,blocked\n",
            CsvDialect::Standard,
            ImportPolicy::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::InvalidValue { .. }));
    }

    #[test]
    fn test_import_defaults_blank_enums() {
        let tasks: Vec<Task> = import_csv(
            "Title,Status,Priority,Story Points\nWrite docs,,,\n",
            CsvDialect::Standard,
            ImportPolicy::Strict,
        )
        .unwrap();
        assert_eq!(tasks[0].status, TaskStatus::Todo);
        assert_eq!(tasks[0].priority, Priority::Medium);
        assert_eq!(tasks[0].story_points, 0);
    }
}
