use rusqlite::{Connection, OptionalExtension};

use super::DatabaseError;
use crate::models::Category;

fn row_to_category(row: &rusqlite::Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        name: row.get(0)?,
        color: row.get(1)?,
        archived: row.get::<_, i64>(2)? != 0,
    })
}

/// Get a single category by name
pub fn get(conn: &Connection, name: &str) -> Result<Option<Category>, DatabaseError> {
    let mut stmt = conn.prepare_cached("SELECT name, color, archived FROM categories WHERE name = ?1")?;
    Ok(stmt.query_row(rusqlite::params![name], row_to_category).optional()?)
}

/// Insert or replace a category keyed by name
pub fn put(conn: &Connection, category: &Category) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO categories (name, color, archived) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET color = excluded.color, archived = excluded.archived",
        rusqlite::params![
            category.name,
            category.color,
            if category.archived { 1 } else { 0 }
        ],
    )?;
    Ok(())
}

pub fn bulk_put(conn: &Connection, categories: &[Category]) -> Result<(), DatabaseError> {
    for category in categories {
        put(conn, category)?;
    }
    Ok(())
}

/// All categories ordered by name ASC
pub fn scan(conn: &Connection) -> Result<Vec<Category>, DatabaseError> {
    let mut stmt = conn.prepare_cached("SELECT name, color, archived FROM categories ORDER BY name ASC")?;
    let categories = stmt.query_map([], row_to_category)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}
