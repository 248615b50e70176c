//! Derived-view membership and diffing.
//!
//! `derive_view` is the only place membership is decided. The incremental
//! cascade, the full rebuilds and the consistency check all compare against it.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::database::{view_table, DatabaseError};
use crate::models::{Task, ViewEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// Tasks due on the current date, completed or not
    Today,
    /// Open tasks whose due date is strictly in the past
    Overdue,
    /// Every open task (the global inbox)
    Active,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [ViewKind::Today, ViewKind::Overdue, ViewKind::Active];

    pub fn table(self) -> &'static str {
        match self {
            ViewKind::Today => "today_tasks",
            ViewKind::Overdue => "overdue_tasks",
            ViewKind::Active => "all_tasks",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ViewKind::Today => "today",
            ViewKind::Overdue => "overdue",
            ViewKind::Active => "active",
        }
    }

    /// Membership predicate. `today` is an ISO `YYYY-MM-DD` date.
    pub fn admits(self, task: &Task, today: &str) -> bool {
        match self {
            ViewKind::Today => is_due_today(task, today),
            ViewKind::Overdue => is_overdue(task, today),
            ViewKind::Active => !task.completed,
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn is_due_today(task: &Task, today: &str) -> bool {
    task.due_date.as_deref() == Some(today)
}

/// Zero-padded ISO dates order lexicographically, so a string compare is a
/// date compare.
pub fn is_overdue(task: &Task, today: &str) -> bool {
    match task.due_date.as_deref() {
        Some(due) if !due.trim().is_empty() => due < today && !task.completed,
        _ => false,
    }
}

/// Project every stored task admitted by `kind`, ordered by task id
pub fn derive_view(tasks: &[Task], kind: ViewKind, today: &str) -> Vec<ViewEntry> {
    let mut entries: Vec<ViewEntry> = tasks
        .iter()
        .filter(|task| kind.admits(task, today))
        .filter_map(|task| task.id.map(|id| ViewEntry::project(id, task)))
        .collect();
    entries.sort_by_key(|entry| entry.task_id);
    entries
}

/// Row-level changes that turn a persisted view into a derived one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewDiff {
    pub insert: Vec<ViewEntry>,
    /// Entries carrying the persisted row id they overwrite
    pub update: Vec<ViewEntry>,
    /// Task ids whose entries must go
    pub delete: Vec<i64>,
}

impl ViewDiff {
    pub fn plan(current: &[ViewEntry], desired: &[ViewEntry]) -> Self {
        let mut existing: BTreeMap<i64, &ViewEntry> =
            current.iter().map(|entry| (entry.task_id, entry)).collect();
        let mut diff = ViewDiff::default();

        for want in desired {
            match existing.remove(&want.task_id) {
                Some(have) if have.same_projection(want) => {}
                Some(have) => diff.update.push(ViewEntry {
                    id: have.id,
                    ..want.clone()
                }),
                None => diff.insert.push(want.clone()),
            }
        }
        diff.delete = existing.into_keys().collect();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.insert.len() + self.update.len() + self.delete.len()
    }

    /// Write the diff. Deletes run first so a re-inserted task id cannot
    /// collide with its stale row.
    pub fn apply(&self, conn: &Connection, kind: ViewKind) -> Result<(), DatabaseError> {
        for task_id in &self.delete {
            view_table::delete_by_task(conn, kind, *task_id)?;
        }
        for entry in &self.update {
            view_table::put(conn, kind, entry)?;
        }
        view_table::bulk_add(conn, kind, &self.insert)
    }

    /// Describe the diff as drift findings for `view`
    pub fn drifts(&self, view: ViewKind) -> Vec<Drift> {
        let missing = self.insert.iter().map(|e| (e.task_id, DriftKind::Missing));
        let stale = self.update.iter().map(|e| (e.task_id, DriftKind::Stale));
        let extra = self.delete.iter().map(|id| (*id, DriftKind::Extra));
        let mut drifts: Vec<Drift> = missing
            .chain(stale)
            .chain(extra)
            .map(|(task_id, kind)| Drift { view, task_id, kind })
            .collect();
        drifts.sort_by_key(|d| d.task_id);
        drifts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftKind {
    /// Admitted by the view but no entry exists
    Missing,
    /// Entry exists but its copied fields lag the canonical row
    Stale,
    /// Entry exists for a task the view does not admit
    Extra,
}

/// One disagreement between a persisted view and its derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub view: ViewKind,
    pub task_id: i64,
    pub kind: DriftKind,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            DriftKind::Missing => "missing",
            DriftKind::Stale => "stale",
            DriftKind::Extra => "extra",
        };
        write!(f, "{} view: task {} {}", self.view, self.task_id, what)
    }
}
