//! Row primitives shared by the three derived view tables.
//!
//! The table name always comes from [`ViewKind::table`], never from input.

use rusqlite::{Connection, OptionalExtension};

use super::DatabaseError;
use crate::models::ViewEntry;
use crate::views::ViewKind;

const COLUMNS: &str = "id, task_id, title, note, due_date, due_time, priority, \"group\", completed";

fn row_to_entry(row: &rusqlite::Row) -> Result<ViewEntry, rusqlite::Error> {
    Ok(ViewEntry {
        id: Some(row.get(0)?),
        task_id: row.get(1)?,
        title: row.get(2)?,
        note: row.get(3)?,
        due_date: row.get(4)?,
        due_time: row.get(5)?,
        priority: row.get(6)?,
        group: row.get(7)?,
        completed: row.get::<_, i64>(8)? != 0,
    })
}

/// Look up the entry projecting `task_id`, if any
pub fn get_by_task(conn: &Connection, kind: ViewKind, task_id: i64) -> Result<Option<ViewEntry>, DatabaseError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {COLUMNS} FROM {} WHERE task_id = ?1",
        kind.table()
    ))?;
    Ok(stmt.query_row(rusqlite::params![task_id], row_to_entry).optional()?)
}

/// Insert a new entry (when `id` is unset) or overwrite the row with that `id`
pub fn put(conn: &Connection, kind: ViewKind, entry: &ViewEntry) -> Result<i64, DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO {} ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                task_id = excluded.task_id,
                title = excluded.title,
                note = excluded.note,
                due_date = excluded.due_date,
                due_time = excluded.due_time,
                priority = excluded.priority,
                \"group\" = excluded.\"group\",
                completed = excluded.completed",
            kind.table()
        ),
        rusqlite::params![
            entry.id,
            entry.task_id,
            entry.title,
            entry.note,
            entry.due_date,
            entry.due_time,
            entry.priority,
            entry.group,
            if entry.completed { 1 } else { 0 }
        ],
    )?;
    Ok(match entry.id {
        Some(id) => id,
        None => conn.last_insert_rowid(),
    })
}

/// Append entries with fresh ids, ignoring any `id` they carry
pub fn bulk_add(conn: &Connection, kind: ViewKind, entries: &[ViewEntry]) -> Result<(), DatabaseError> {
    for entry in entries {
        put(conn, kind, &ViewEntry { id: None, ..entry.clone() })?;
    }
    Ok(())
}

/// Delete the entry projecting `task_id`. Returns the number of rows removed.
pub fn delete_by_task(conn: &Connection, kind: ViewKind, task_id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        &format!("DELETE FROM {} WHERE task_id = ?1", kind.table()),
        rusqlite::params![task_id],
    )?)
}

/// Remove every row from the view
pub fn clear(conn: &Connection, kind: ViewKind) -> Result<usize, DatabaseError> {
    Ok(conn.execute(&format!("DELETE FROM {}", kind.table()), [])?)
}

/// Full table scan ordered by view-local id
pub fn scan(conn: &Connection, kind: ViewKind) -> Result<Vec<ViewEntry>, DatabaseError> {
    let mut stmt = conn.prepare_cached(&format!("SELECT {COLUMNS} FROM {} ORDER BY id ASC", kind.table()))?;
    let entries = stmt.query_map([], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Rows whose copied `completed` flag is false, ordered by view-local id
pub fn scan_open(conn: &Connection, kind: ViewKind) -> Result<Vec<ViewEntry>, DatabaseError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {COLUMNS} FROM {} WHERE completed = 0 ORDER BY id ASC",
        kind.table()
    ))?;
    let entries = stmt.query_map([], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::Task;

    fn entry(task_id: i64, title: &str) -> ViewEntry {
        ViewEntry::project(task_id, &Task::new(title))
    }

    #[test]
    fn task_id_is_unique_per_view() {
        let db = Database::open_in_memory().expect("open db");
        put(db.conn(), ViewKind::Today, &entry(1, "a")).expect("first insert");
        assert!(put(db.conn(), ViewKind::Today, &entry(1, "dup")).is_err());
        // Same task may appear once in each of the other views
        put(db.conn(), ViewKind::Overdue, &entry(1, "a")).expect("other view");
    }

    #[test]
    fn cleared_view_numbers_rows_from_one() {
        let db = Database::open_in_memory().expect("open db");
        bulk_add(db.conn(), ViewKind::Overdue, &[entry(5, "a"), entry(9, "b")]).expect("add");
        let first = scan(db.conn(), ViewKind::Overdue).expect("scan");

        assert_eq!(clear(db.conn(), ViewKind::Overdue).expect("clear"), 2);
        bulk_add(db.conn(), ViewKind::Overdue, &first).expect("re-add");
        assert_eq!(scan(db.conn(), ViewKind::Overdue).expect("scan"), first);
        assert_eq!(first[0].id, Some(1));
    }

    #[test]
    fn scan_open_skips_completed_rows() {
        let db = Database::open_in_memory().expect("open db");
        let mut done = entry(2, "done");
        done.completed = true;
        bulk_add(db.conn(), ViewKind::Active, &[entry(1, "open"), done]).expect("add");

        let open = scan_open(db.conn(), ViewKind::Active).expect("scan");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].task_id, 1);
        assert_eq!(delete_by_task(db.conn(), ViewKind::Active, 2).expect("delete"), 1);
        assert!(get_by_task(db.conn(), ViewKind::Active, 2).expect("get").is_none());
    }
}
