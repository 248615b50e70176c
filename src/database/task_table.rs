//! Row primitives for the canonical `tasks` table.
//!
//! Every function takes a plain connection so callers can run it inside a
//! transaction (`Transaction` derefs to `Connection`).

use rusqlite::{Connection, OptionalExtension};

use super::DatabaseError;
use crate::models::Task;

const COLUMNS: &str = "id, title, note, due_date, due_time, \"group\", priority, repeat_type, repeat_value, archived, completed";

/// Helper function to map a row to a Task
fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    Ok(Task {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        note: row.get(2)?,
        due_date: row.get(3)?,
        due_time: row.get(4)?,
        group: row.get(5)?,
        priority: row.get(6)?,
        repeat_type: row.get(7)?,
        repeat_value: row.get(8)?,
        archived: row.get::<_, i64>(9)? != 0,
        completed: row.get::<_, i64>(10)? != 0,
    })
}

fn query(conn: &Connection, filter: &str, params: impl rusqlite::Params) -> Result<Vec<Task>, DatabaseError> {
    let mut stmt = conn.prepare_cached(&format!("SELECT {COLUMNS} FROM tasks {filter} ORDER BY id ASC"))?;
    let tasks = stmt.query_map(params, row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

/// Get a single task by ID
pub fn get(conn: &Connection, id: i64) -> Result<Option<Task>, DatabaseError> {
    let mut stmt = conn.prepare_cached(&format!("SELECT {COLUMNS} FROM tasks WHERE id = ?1"))?;
    Ok(stmt.query_row(rusqlite::params![id], row_to_task).optional()?)
}

/// Insert or replace a task and return its ID. A task without an ID gets a
/// freshly generated one.
pub fn put(conn: &Connection, task: &Task) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO tasks (id, title, note, due_date, due_time, \"group\", priority, repeat_type, repeat_value, archived, completed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            note = excluded.note,
            due_date = excluded.due_date,
            due_time = excluded.due_time,
            \"group\" = excluded.\"group\",
            priority = excluded.priority,
            repeat_type = excluded.repeat_type,
            repeat_value = excluded.repeat_value,
            archived = excluded.archived,
            completed = excluded.completed",
        rusqlite::params![
            task.id,
            task.title,
            task.note,
            task.due_date,
            task.due_time,
            task.group,
            task.priority,
            task.repeat_type,
            task.repeat_value,
            if task.archived { 1 } else { 0 },
            if task.completed { 1 } else { 0 }
        ],
    )?;
    Ok(match task.id {
        Some(id) => id,
        None => conn.last_insert_rowid(),
    })
}

/// Put every task, returning the IDs in input order
pub fn bulk_put(conn: &Connection, tasks: &[Task]) -> Result<Vec<i64>, DatabaseError> {
    tasks.iter().map(|task| put(conn, task)).collect()
}

/// Equality query on the indexed `due_date` column
pub fn query_by_due_date(conn: &Connection, due_date: &str) -> Result<Vec<Task>, DatabaseError> {
    query(conn, "WHERE due_date = ?1", rusqlite::params![due_date])
}

/// Equality query on the indexed `group` column
pub fn query_by_group(conn: &Connection, group: &str) -> Result<Vec<Task>, DatabaseError> {
    query(conn, "WHERE \"group\" = ?1", rusqlite::params![group])
}

/// Full table scan ordered by ID
pub fn scan(conn: &Connection) -> Result<Vec<Task>, DatabaseError> {
    query(conn, "", [])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::{Priority, RepeatType, RepeatValue};

    #[test]
    fn put_round_trips_every_column() {
        let db = Database::open_in_memory().expect("open db");
        let mut task = Task::new("Gym");
        task.note = Some("leg day".to_string());
        task.due_date = Some("2024-03-01".to_string());
        task.due_time = Some("18:30".to_string());
        task.group = Some("Health".to_string());
        task.priority = Some(Priority::High);
        task.repeat_type = RepeatType::Weekly;
        task.repeat_value = Some(RepeatValue::Number(3));

        let id = put(db.conn(), &task).expect("insert");
        task.id = Some(id);
        assert_eq!(get(db.conn(), id).expect("get"), Some(task));
    }

    #[test]
    fn put_with_existing_id_updates_in_place() {
        let db = Database::open_in_memory().expect("open db");
        let id = put(db.conn(), &Task::new("Draft")).expect("insert");

        let mut task = get(db.conn(), id).expect("get").expect("exists");
        task.title = "Final".to_string();
        task.completed = true;
        assert_eq!(put(db.conn(), &task).expect("update"), id);

        let all = scan(db.conn()).expect("scan");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Final");
        assert!(all[0].completed);
    }

    #[test]
    fn indexed_queries_match_exactly() {
        let db = Database::open_in_memory().expect("open db");
        let mut a = Task::new("a");
        a.due_date = Some("2024-01-05".to_string());
        a.group = Some("Work".to_string());
        let mut b = Task::new("b");
        b.due_date = Some("2024-01-06".to_string());
        b.group = Some("work".to_string());
        bulk_put(db.conn(), &[a, b]).expect("bulk put");

        assert_eq!(query_by_due_date(db.conn(), "2024-01-05").expect("query").len(), 1);
        let work = query_by_group(db.conn(), "Work").expect("query");
        assert_eq!(work.len(), 1);
        assert_eq!(work[0].title, "a");
        assert!(get(db.conn(), 999).expect("get").is_none());
    }
}
