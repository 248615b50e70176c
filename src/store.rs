use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::database::{category_table, task_table, view_table, Database, DatabaseError};
use crate::models::{Category, Task, ViewEntry};
use crate::projector;
use crate::utils::{format_date, Clock};
use crate::views::{is_overdue, Drift, ViewDiff, ViewKind};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Task title must not be empty")]
    EmptyTitle,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::DatabaseError(err.into())
    }
}

/// Result of a completion toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub task_id: i64,
    pub completed: bool,
    /// Today and overdue rows the closing pass had to fix after the
    /// incremental steps
    pub repaired: usize,
}

/// Entry counts after a full view sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub today: usize,
    pub overdue: usize,
    pub active: usize,
}

/// Canonical task table plus the today, overdue and active projections.
///
/// Every mutating operation runs in one SQLite transaction, so a failure
/// leaves all tables as they were before the call.
pub struct TaskStore {
    db: Database,
    clock: Box<dyn Clock>,
}

impl TaskStore {
    pub fn new(db: Database, clock: impl Clock + 'static) -> Self {
        Self {
            db,
            clock: Box::new(clock),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Current date as an ISO string
    pub fn today(&self) -> String {
        format_date(self.clock.today())
    }

    /// Upsert tasks. Views are not touched; call [`TaskStore::sync_views`]
    /// afterwards.
    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn save(&self, tasks: &[Task]) -> Result<Vec<i64>, StoreError> {
        if tasks.iter().any(|task| task.title.trim().is_empty()) {
            return Err(StoreError::EmptyTitle);
        }
        let tx = self.db.transaction()?;
        let ids = task_table::bulk_put(&tx, tasks)?;
        tx.commit()?;
        info!(saved = ids.len(), "saved tasks");
        Ok(ids)
    }

    pub fn get(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(task_table::get(self.db.conn(), id)?)
    }

    /// Flip `archived`. Returns the new value, or `None` when the task does
    /// not exist.
    #[tracing::instrument(skip(self))]
    pub fn toggle_archive(&self, id: i64) -> Result<Option<bool>, StoreError> {
        let tx = self.db.transaction()?;
        let Some(mut task) = task_table::get(&tx, id)? else {
            debug!("no such task, nothing to archive");
            return Ok(None);
        };
        task.archived = !task.archived;
        task_table::put(&tx, &task)?;
        tx.commit()?;
        info!(archived = task.archived, "toggled archive");
        Ok(Some(task.archived))
    }

    /// Open tasks in a category. An empty name yields nothing.
    pub fn query_by_group(&self, name: &str) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.query_all_by_group(name)?;
        tasks.retain(|task| !task.completed);
        Ok(tasks)
    }

    /// Every task in a category, completed included. An empty name yields nothing.
    pub fn query_all_by_group(&self, name: &str) -> Result<Vec<Task>, StoreError> {
        if name.is_empty() {
            return Ok(Vec::new());
        }
        Ok(task_table::query_by_group(self.db.conn(), name)?)
    }

    /// Bring the today view in line with the tasks due today
    #[tracing::instrument(skip(self))]
    pub fn refresh_today(&self) -> Result<usize, StoreError> {
        let today = self.today();
        let tx = self.db.transaction()?;
        let count = projector::refresh_today(&tx, &today)?;
        tx.commit()?;
        Ok(count)
    }

    /// Refresh, then return the open entries of the today view
    pub fn load_today(&self) -> Result<Vec<ViewEntry>, StoreError> {
        let today = self.today();
        let tx = self.db.transaction()?;
        projector::refresh_today(&tx, &today)?;
        let entries = view_table::scan_open(&tx, ViewKind::Today)?;
        tx.commit()?;
        Ok(entries)
    }

    /// Open tasks due strictly before today, read straight from the canonical table
    pub fn compute_overdue_set(&self) -> Result<Vec<Task>, StoreError> {
        let today = self.today();
        let mut tasks = task_table::scan(self.db.conn())?;
        tasks.retain(|task| is_overdue(task, &today));
        Ok(tasks)
    }

    /// Clear the overdue view and repopulate it from the canonical table
    #[tracing::instrument(skip(self))]
    pub fn rebuild_overdue(&self) -> Result<usize, StoreError> {
        self.rebuild(ViewKind::Overdue)
    }

    /// Open rows of the persisted overdue view, without refreshing
    pub fn load_overdue_from_store(&self) -> Result<Vec<ViewEntry>, StoreError> {
        Ok(view_table::scan_open(self.db.conn(), ViewKind::Overdue)?)
    }

    /// Clear the active view and repopulate it from the canonical table
    #[tracing::instrument(skip(self))]
    pub fn rebuild_active(&self) -> Result<usize, StoreError> {
        self.rebuild(ViewKind::Active)
    }

    /// Open rows of the persisted active view (the global inbox)
    pub fn load_active(&self) -> Result<Vec<ViewEntry>, StoreError> {
        Ok(view_table::scan_open(self.db.conn(), ViewKind::Active)?)
    }

    /// Every persisted row of a view, completed ones included
    pub fn view_entries(&self, kind: ViewKind) -> Result<Vec<ViewEntry>, StoreError> {
        Ok(view_table::scan(self.db.conn(), kind)?)
    }

    fn rebuild(&self, kind: ViewKind) -> Result<usize, StoreError> {
        let today = self.today();
        let tx = self.db.transaction()?;
        let count = projector::rebuild(&tx, kind, &today)?;
        tx.commit()?;
        Ok(count)
    }

    /// Flip `completed` and reconcile all three views in one transaction.
    ///
    /// Returns `None` when the task does not exist.
    #[tracing::instrument(skip(self))]
    pub fn toggle_complete(&self, id: i64) -> Result<Option<ToggleOutcome>, StoreError> {
        let today = self.today();
        let tx = self.db.transaction()?;

        let Some(mut task) = task_table::get(&tx, id)? else {
            debug!("no such task, nothing to toggle");
            return Ok(None);
        };
        task.completed = !task.completed;
        task_table::put(&tx, &task)?;

        // Due date is unchanged, so the today entry only needs the flag
        if let Some(mut entry) = view_table::get_by_task(&tx, ViewKind::Today, id)? {
            entry.completed = task.completed;
            view_table::put(&tx, ViewKind::Today, &entry)?;
        }

        match view_table::get_by_task(&tx, ViewKind::Active, id)? {
            Some(_) if task.completed => {
                view_table::delete_by_task(&tx, ViewKind::Active, id)?;
            }
            Some(mut entry) => {
                entry.completed = task.completed;
                view_table::put(&tx, ViewKind::Active, &entry)?;
            }
            None if !task.completed => {
                view_table::put(&tx, ViewKind::Active, &ViewEntry::project(id, &task))?;
            }
            None => {}
        }

        match view_table::get_by_task(&tx, ViewKind::Overdue, id)? {
            Some(_) if task.completed => {
                view_table::delete_by_task(&tx, ViewKind::Overdue, id)?;
            }
            Some(mut entry) => {
                entry.completed = task.completed;
                view_table::put(&tx, ViewKind::Overdue, &entry)?;
            }
            None if is_overdue(&task, &today) => {
                view_table::put(&tx, ViewKind::Overdue, &ViewEntry::project(id, &task))?;
            }
            None => {}
        }

        // Closing full pass. Anything it has to fix is reported, not hidden.
        let today_drift = ViewDiff::plan(
            &view_table::scan(&tx, ViewKind::Today)?,
            &projector::derive_from_store(&tx, ViewKind::Today, &today)?,
        )
        .len();
        let desired = projector::derive_from_store(&tx, ViewKind::Overdue, &today)?;
        let current = view_table::scan(&tx, ViewKind::Overdue)?;
        let overdue_drift = ViewDiff::plan(&current, &desired).len();
        let repaired = today_drift + overdue_drift;
        if repaired > 0 {
            warn!(today = today_drift, overdue = overdue_drift, "views drifted from canonical tasks; repairing");
        }
        projector::refresh_today(&tx, &today)?;
        projector::replace_view(&tx, ViewKind::Overdue, &desired)?;

        tx.commit()?;
        info!(completed = task.completed, "toggled completion");

        Ok(Some(ToggleOutcome {
            task_id: id,
            completed: task.completed,
            repaired,
        }))
    }

    /// Full resync of every view, as required after a bulk `save`
    #[tracing::instrument(skip(self))]
    pub fn sync_views(&self) -> Result<SyncReport, StoreError> {
        let today = self.today();
        let tx = self.db.transaction()?;
        let report = SyncReport {
            today: projector::refresh_today(&tx, &today)?,
            overdue: projector::rebuild(&tx, ViewKind::Overdue, &today)?,
            active: projector::rebuild(&tx, ViewKind::Active, &today)?,
        };
        tx.commit()?;
        info!(today = report.today, overdue = report.overdue, active = report.active, "synced views");
        Ok(report)
    }

    /// Compare each persisted view with its derivation. Read-only.
    pub fn check_consistency(&self) -> Result<Vec<Drift>, StoreError> {
        let today = self.today();
        let conn = self.db.conn();
        let mut drifts = Vec::new();
        for kind in ViewKind::ALL {
            let desired = projector::derive_from_store(conn, kind, &today)?;
            let current = view_table::scan(conn, kind)?;
            drifts.extend(ViewDiff::plan(&current, &desired).drifts(kind));
        }
        if !drifts.is_empty() {
            warn!(count = drifts.len(), "views disagree with canonical tasks");
        }
        Ok(drifts)
    }

    pub fn save_categories(&self, categories: &[Category]) -> Result<(), StoreError> {
        let tx = self.db.transaction()?;
        category_table::bulk_put(&tx, categories)?;
        tx.commit()?;
        Ok(())
    }

    pub fn load_categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(category_table::scan(self.db.conn())?)
    }

    pub fn get_category(&self, name: &str) -> Result<Option<Category>, StoreError> {
        Ok(category_table::get(self.db.conn(), name)?)
    }

    /// Flip a category's `archived` flag; `None` when it does not exist
    pub fn toggle_category_archive(&self, name: &str) -> Result<Option<bool>, StoreError> {
        let tx = self.db.transaction()?;
        let Some(mut category) = category_table::get(&tx, name)? else {
            return Ok(None);
        };
        category.archived = !category.archived;
        category_table::put(&tx, &category)?;
        tx.commit()?;
        Ok(Some(category.archived))
    }
}
