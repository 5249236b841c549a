//! Sprint board: sprints and the tasks planned into them.

use super::{
    choice, entry_for, export_from, import_into, json, number_or, optional_date, reference,
    required, roll_back, save, unknown_field, AppKind, DeleteReport, EntityKind, Entry, FormState,
    ImportOptions, Stat, Workspace,
};
use crate::entity::agile::{seed_sprints, seed_tasks, Sprint, SprintStatus, Task, TaskStatus};
use crate::entity::{format_date, non_blank, resolve_label};
use crate::error::{Result, ValidationError};
use crate::storage::{Collection, KvBackend, Patch};
use crate::transfer::{self, Format, ImportPolicy};
use crate::view::{average, project, rate, Aggregate, Query, Rounding, Sentinel, SortState};
use crate::warnings::{check_references, Warning};

/// Upper bound accepted for story points on a single task.
pub const MAX_STORY_POINTS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgileKind {
    Sprint,
    Task,
}

impl EntityKind for AgileKind {
    const ALL: &'static [Self] = &[AgileKind::Sprint, AgileKind::Task];
}

impl std::fmt::Display for AgileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgileKind::Sprint => write!(f, "sprints"),
            AgileKind::Task => write!(f, "tasks"),
        }
    }
}

impl std::str::FromStr for AgileKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sprint" | "sprints" => Ok(AgileKind::Sprint),
            "task" | "tasks" => Ok(AgileKind::Task),
            _ => Err(format!(
                "Unknown collection '{}'. Valid collections: sprints, tasks",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SprintForm {
    pub name: String,
    pub goal: String,
    pub starts_on: String,
    pub ends_on: String,
    pub status: String,
}

impl SprintForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "name" => &mut self.name,
            "goal" => &mut self.goal,
            "starts_on" | "start" => &mut self.starts_on,
            "ends_on" | "end" => &mut self.ends_on,
            "status" => &mut self.status,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("goal", self.goal.clone()),
            ("starts_on", self.starts_on.clone()),
            ("ends_on", self.ends_on.clone()),
            ("status", self.status.clone()),
        ]
    }

    fn validate(&self) -> std::result::Result<Sprint, ValidationError> {
        let starts_on = optional_date("starts_on", &self.starts_on)?;
        let ends_on = optional_date("ends_on", &self.ends_on)?;
        if let (Some(start), Some(end)) = (starts_on, ends_on) {
            if end < start {
                return Err(ValidationError::new("ends_on", "must not be before the start date"));
            }
        }
        Ok(Sprint {
            id: String::new(),
            name: required("name", &self.name)?,
            goal: non_blank(&self.goal),
            starts_on,
            ends_on,
            status: choice("status", &self.status)?,
        })
    }
}

impl From<&Sprint> for SprintForm {
    fn from(sprint: &Sprint) -> Self {
        Self {
            name: sprint.name.clone(),
            goal: sprint.goal.clone().unwrap_or_default(),
            starts_on: format_date(sprint.starts_on),
            ends_on: format_date(sprint.ends_on),
            status: sprint.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub story_points: String,
    pub assignee: String,
    pub sprint_id: String,
    pub due_on: String,
}

impl TaskForm {
    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        let slot = match field {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "status" => &mut self.status,
            "priority" => &mut self.priority,
            "story_points" | "points" => &mut self.story_points,
            "assignee" => &mut self.assignee,
            "sprint_id" | "sprint" => &mut self.sprint_id,
            "due_on" | "due" => &mut self.due_on,
            _ => return Err(unknown_field(field)),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("title", self.title.clone()),
            ("description", self.description.clone()),
            ("status", self.status.clone()),
            ("priority", self.priority.clone()),
            ("story_points", self.story_points.clone()),
            ("assignee", self.assignee.clone()),
            ("sprint_id", self.sprint_id.clone()),
            ("due_on", self.due_on.clone()),
        ]
    }

    fn validate(&self, sprints: &Collection<Sprint>) -> std::result::Result<Task, ValidationError> {
        let story_points: u32 = number_or("story_points", &self.story_points, 0)?;
        if story_points > MAX_STORY_POINTS {
            return Err(ValidationError::new(
                "story_points",
                format!("must be at most {}", MAX_STORY_POINTS),
            ));
        }
        Ok(Task {
            id: String::new(),
            title: required("title", &self.title)?,
            description: non_blank(&self.description),
            status: choice("status", &self.status)?,
            priority: choice("priority", &self.priority)?,
            story_points,
            assignee: non_blank(&self.assignee),
            sprint_id: reference("sprint_id", &self.sprint_id, sprints)?,
            due_on: optional_date("due_on", &self.due_on)?,
        })
    }
}

impl From<&Task> for TaskForm {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            status: task.status.to_string(),
            priority: task.priority.to_string(),
            story_points: task.story_points.to_string(),
            assignee: task.assignee.clone().unwrap_or_default(),
            sprint_id: task.sprint_id.clone().unwrap_or_default(),
            due_on: format_date(task.due_on),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgileForm {
    Sprint(SprintForm),
    Task(TaskForm),
}

impl FormState for AgileForm {
    type Kind = AgileKind;

    fn kind(&self) -> AgileKind {
        match self {
            AgileForm::Sprint(_) => AgileKind::Sprint,
            AgileForm::Task(_) => AgileKind::Task,
        }
    }

    fn set(&mut self, field: &str, value: &str) -> Result<()> {
        match self {
            AgileForm::Sprint(form) => form.set(field, value),
            AgileForm::Task(form) => form.set(field, value),
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            AgileForm::Sprint(form) => form.fields(),
            AgileForm::Task(form) => form.fields(),
        }
    }
}

/// Task and point totals for one sprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SprintProgress {
    pub tasks: usize,
    pub done: usize,
    pub points: u32,
    pub done_points: u32,
    pub completion: Aggregate,
}

#[derive(Debug, Clone, Default)]
pub struct AgileWorkspace {
    pub sprints: Collection<Sprint>,
    pub tasks: Collection<Task>,
}

impl AgileWorkspace {
    const ROUNDING: Rounding = Rounding::Integer;

    pub fn sprint_progress(&self, sprint_id: &str) -> SprintProgress {
        let tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.sprint_id.as_deref() == Some(sprint_id))
            .collect();
        let done: Vec<&&Task> = tasks.iter().filter(|t| t.status == TaskStatus::Done).collect();
        SprintProgress {
            tasks: tasks.len(),
            done: done.len(),
            points: tasks.iter().map(|t| t.story_points).sum(),
            done_points: done.iter().map(|t| t.story_points).sum(),
            completion: rate(done.len(), tasks.len(), Self::ROUNDING, Self::SENTINEL),
        }
    }

    /// Mean completed points across completed sprints.
    pub fn velocity(&self) -> Aggregate {
        average(
            self.sprints
                .iter()
                .filter(|s| s.status == SprintStatus::Completed)
                .map(|s| self.sprint_progress(&s.id).done_points as f64),
            Self::ROUNDING,
            Self::SENTINEL,
        )
    }

    fn sprint_entry(&self, sprint: &Sprint) -> Result<Entry> {
        let progress = self.sprint_progress(&sprint.id);
        let summary = format!(
            "{} [{}] | {} to {} | {}/{} tasks, {}/{} pts ({}%)",
            sprint.name,
            sprint.status,
            format_date(sprint.starts_on),
            format_date(sprint.ends_on),
            progress.done,
            progress.tasks,
            progress.done_points,
            progress.points,
            progress.completion
        );
        entry_for(
            sprint,
            summary,
            &[
                ("tasks", json(progress.tasks)),
                ("done", json(progress.done)),
                ("points", json(progress.points)),
                ("done_points", json(progress.done_points)),
                ("completion", json(progress.completion)),
            ],
        )
    }

    fn task_entry(&self, task: &Task) -> Result<Entry> {
        let sprint = resolve_label(self.sprints.records(), task.sprint_id.as_deref(), |s| &s.name);
        let summary = format!(
            "{} [{}] {} | {} pts | {} | {}",
            task.title,
            task.status,
            task.priority,
            task.story_points,
            task.assignee.as_deref().unwrap_or("-"),
            sprint
        );
        entry_for(task, summary, &[("sprint_name", json(sprint))])
    }
}

impl Workspace for AgileWorkspace {
    type Kind = AgileKind;
    type Form = AgileForm;

    const APP: AppKind = AppKind::Agile;
    const IMPORT_POLICY: ImportPolicy = ImportPolicy::Strict;
    const SENTINEL: Sentinel = Sentinel::Zero;

    fn load(backend: &mut dyn KvBackend) -> (Self, Vec<Warning>) {
        let (sprints, w1) = Collection::load(backend, seed_sprints);
        let (tasks, w2) = Collection::load(backend, seed_tasks);
        let mut warnings: Vec<Warning> = [w1, w2].into_iter().flatten().collect();
        warnings.extend(check_references(
            "task",
            "sprint_id",
            tasks.iter().filter_map(|t: &Task| t.sprint_id.as_deref()),
            |id| sprints.contains(id),
        ));
        (Self { sprints, tasks }, warnings)
    }

    fn blank_form(kind: AgileKind) -> AgileForm {
        match kind {
            AgileKind::Sprint => AgileForm::Sprint(SprintForm::default()),
            AgileKind::Task => AgileForm::Task(TaskForm::default()),
        }
    }

    fn edit_form(&self, kind: AgileKind, id: &str) -> Result<AgileForm> {
        Ok(match kind {
            AgileKind::Sprint => AgileForm::Sprint(self.sprints.require(id)?.into()),
            AgileKind::Task => AgileForm::Task(self.tasks.require(id)?.into()),
        })
    }

    fn submit(&mut self, backend: &mut dyn KvBackend, form: &AgileForm, target: Option<&str>) -> Result<String> {
        match form {
            AgileForm::Sprint(form) => {
                let sprint = form.validate()?;
                save(&mut self.sprints, backend, sprint, target)
            }
            AgileForm::Task(form) => {
                let task = form.validate(&self.sprints)?;
                save(&mut self.tasks, backend, task, target)
            }
        }
    }

    fn patch(&mut self, backend: &mut dyn KvBackend, kind: AgileKind, id: &str, patch: &Patch) -> Result<String> {
        match kind {
            AgileKind::Sprint => self.sprints.update(backend, id, patch).map(|r| r.id),
            AgileKind::Task => self.tasks.update(backend, id, patch).map(|r| r.id),
        }
    }

    fn delete(&mut self, backend: &mut dyn KvBackend, kind: AgileKind, id: &str) -> Result<DeleteReport> {
        match kind {
            AgileKind::Sprint => {
                self.sprints.require(id)?;
                let tasks_before = self.tasks.snapshot();
                let unlinked = self.tasks.update_where(
                    backend,
                    |t| t.sprint_id.as_deref() == Some(id),
                    |t| t.sprint_id = None,
                )?;
                let sprint = match self.sprints.delete(backend, id) {
                    Ok(sprint) => sprint,
                    Err(e) => {
                        roll_back(&mut self.tasks, backend, tasks_before);
                        return Err(e);
                    }
                };
                Ok(DeleteReport {
                    label: sprint.name,
                    cascaded: 0,
                    unlinked,
                })
            }
            AgileKind::Task => {
                let task = self.tasks.delete(backend, id)?;
                Ok(DeleteReport {
                    label: task.title,
                    ..DeleteReport::default()
                })
            }
        }
    }

    fn import(
        &mut self,
        backend: &mut dyn KvBackend,
        kind: AgileKind,
        text: &str,
        options: &ImportOptions,
    ) -> Result<usize> {
        match kind {
            AgileKind::Sprint => import_into(&mut self.sprints, backend, text, options),
            AgileKind::Task => import_into(&mut self.tasks, backend, text, options),
        }
    }

    fn export(&self, kind: AgileKind, format: Format) -> Result<String> {
        match kind {
            AgileKind::Sprint => export_from(&self.sprints, format),
            AgileKind::Task => export_from(&self.tasks, format),
        }
    }

    fn template(kind: AgileKind) -> String {
        match kind {
            AgileKind::Sprint => transfer::template::<Sprint>(),
            AgileKind::Task => transfer::template::<Task>(),
        }
    }

    fn listing(&self, kind: AgileKind, query: &Query, sort: &SortState) -> Result<Vec<Entry>> {
        match kind {
            AgileKind::Sprint => project(self.sprints.records(), query, sort)?
                .into_iter()
                .map(|s| self.sprint_entry(s))
                .collect(),
            AgileKind::Task => project(self.tasks.records(), query, sort)?
                .into_iter()
                .map(|t| self.task_entry(t))
                .collect(),
        }
    }

    fn entry(&self, kind: AgileKind, id: &str) -> Result<Entry> {
        match kind {
            AgileKind::Sprint => self.sprint_entry(self.sprints.require(id)?),
            AgileKind::Task => self.task_entry(self.tasks.require(id)?),
        }
    }

    fn dashboard(&self) -> Vec<Stat> {
        let count = |status: TaskStatus| self.tasks.iter().filter(|t| t.status == status).count();
        let done = count(TaskStatus::Done);
        let active = self
            .sprints
            .iter()
            .find(|s| s.status == SprintStatus::Active)
            .map(|s| s.name.as_str())
            .unwrap_or("none");
        vec![
            Stat::new("Sprints", self.sprints.len()),
            Stat::new("Active sprint", active),
            Stat::new("Tasks", self.tasks.len()),
            Stat::new("To do", count(TaskStatus::Todo)),
            Stat::new("In progress", count(TaskStatus::InProgress)),
            Stat::new("Done", done),
            Stat::new(
                "Completion %",
                rate(done, self.tasks.len(), Self::ROUNDING, Self::SENTINEL),
            ),
            Stat::new("Velocity (pts)", self.velocity()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::view::parse_query;

    fn workspace() -> (AgileWorkspace, MemoryBackend) {
        let mut backend = MemoryBackend::new();
        let (ws, warnings) = AgileWorkspace::load(&mut backend);
        assert!(warnings.is_empty());
        (ws, backend)
    }

    #[test]
    fn test_sprint_progress() {
        let (ws, _) = workspace();
        let progress = ws.sprint_progress("sprint-2");
        assert_eq!(progress.tasks, 2);
        assert_eq!(progress.done, 0);
        assert_eq!(progress.points, 10);
        assert_eq!(progress.completion, Aggregate::Value(0.0));

        let progress = ws.sprint_progress("sprint-1");
        assert_eq!(progress.completion, Aggregate::Value(100.0));
        assert_eq!(ws.velocity(), Aggregate::Value(8.0));
    }

    #[test]
    fn test_empty_sprint_completion_is_zero() {
        let (ws, _) = workspace();
        assert_eq!(ws.sprint_progress("sprint-9").completion, Aggregate::Value(0.0));
    }

    #[test]
    fn test_filter_by_status_keeps_order() {
        let (ws, _) = workspace();
        let rows = ws
            .listing(AgileKind::Task, &parse_query("status:done"), &SortState::new())
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["task-1", "task-2"]);
    }

    #[test]
    fn test_sort_by_points_descending() {
        let (ws, _) = workspace();
        let mut sort = SortState::by("points");
        sort.select("points");
        let rows = ws.listing(AgileKind::Task, &Query::new(), &sort).unwrap();
        assert_eq!(rows[0].id, "task-3");
        assert_eq!(rows[3].id, "task-4");
    }

    #[test]
    fn test_delete_sprint_unlinks_tasks() {
        let (mut ws, mut backend) = workspace();
        let report = ws.delete(&mut backend, AgileKind::Sprint, "sprint-1").unwrap();
        assert_eq!(report.unlinked, 2);
        assert_eq!(ws.tasks.len(), 4);
        assert_eq!(ws.entry(AgileKind::Task, "task-1").unwrap().detail["sprint_name"], "Unassigned");
    }

    #[test]
    fn test_sprint_dates_validated() {
        let (mut ws, mut backend) = workspace();
        let mut form = AgileWorkspace::blank_form(AgileKind::Sprint);
        form.set("name", "Sprint 3").unwrap();
        form.set("start", "2024-11-10").unwrap();
        form.set("end", "2024-11-01").unwrap();
        let err = ws.submit(&mut backend, &form, None).unwrap_err();
        assert!(err.to_string().starts_with("ends_on"));
        assert_eq!(ws.sprints.len(), 2);
    }

    #[test]
    fn test_patch_moves_task() {
        let (mut ws, mut backend) = workspace();
        let patch = serde_json::json!({"status": "done"});
        ws.patch(&mut backend, AgileKind::Task, "task-4", patch.as_object().unwrap())
            .unwrap();
        assert_eq!(ws.tasks.get("task-4").unwrap().status, TaskStatus::Done);

        let bad = serde_json::json!({"status": "blocked"});
        assert!(ws
            .patch(&mut backend, AgileKind::Task, "task-4", bad.as_object().unwrap())
            .is_err());
    }
}
