//! Connection-level projector passes. Callers own the transaction.

use rusqlite::Connection;
use tracing::debug;

use crate::database::{task_table, view_table, DatabaseError};
use crate::models::ViewEntry;
use crate::views::{derive_view, ViewDiff, ViewKind};

/// Upsert an entry for every task due `today` and drop entries whose task
/// is gone or no longer due today. Existing rows keep their ids.
pub fn refresh_today(conn: &Connection, today: &str) -> Result<usize, DatabaseError> {
    let due_today = task_table::query_by_due_date(conn, today)?;
    let desired = derive_view(&due_today, ViewKind::Today, today);
    let current = view_table::scan(conn, ViewKind::Today)?;

    let diff = ViewDiff::plan(&current, &desired);
    diff.apply(conn, ViewKind::Today)?;

    debug!(
        entries = desired.len(),
        inserted = diff.insert.len(),
        updated = diff.update.len(),
        pruned = diff.delete.len(),
        "refreshed today view"
    );
    Ok(desired.len())
}

/// Derive the full entry set for `kind` from a canonical table scan
pub fn derive_from_store(conn: &Connection, kind: ViewKind, today: &str) -> Result<Vec<ViewEntry>, DatabaseError> {
    let tasks = task_table::scan(conn)?;
    Ok(derive_view(&tasks, kind, today))
}

/// Clear the view and bulk-insert `entries`
pub fn replace_view(conn: &Connection, kind: ViewKind, entries: &[ViewEntry]) -> Result<(), DatabaseError> {
    let cleared = view_table::clear(conn, kind)?;
    view_table::bulk_add(conn, kind, entries)?;
    debug!(view = %kind, cleared, inserted = entries.len(), "rebuilt view");
    Ok(())
}

/// Full clear-and-rebuild of `kind` from the canonical table
pub fn rebuild(conn: &Connection, kind: ViewKind, today: &str) -> Result<usize, DatabaseError> {
    let entries = derive_from_store(conn, kind, today)?;
    replace_view(conn, kind, &entries)?;
    Ok(entries.len())
}
