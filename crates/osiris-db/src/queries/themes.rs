use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::models::ThemeRow;
use crate::{Database, now};

const THEME_COLUMNS: &str = "t.id, t.owner_id, t.name, t.colors, t.created_at, t.updated_at";

impl Database {
    /// Insert a theme unless the owner already has `max` of them.
    /// Returns `false` when the cap was reached.
    pub fn insert_theme(&self, id: &str, owner_id: &str, name: &str, colors: &str, max: i64) -> Result<bool> {
        self.with_tx(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM themes WHERE owner_id = ?1", [owner_id], |row| row.get(0))?;
            if count >= max {
                return Ok(false);
            }
            let created_at = now();
            conn.execute(
                "INSERT INTO themes (id, owner_id, name, colors, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id, owner_id, name, colors, created_at],
            )?;
            Ok(true)
        })
    }

    pub fn get_theme(&self, id: &str) -> Result<Option<ThemeRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM themes t WHERE t.id = ?1", THEME_COLUMNS);
            Ok(conn.query_row(&sql, [id], map_theme).optional()?)
        })
    }

    pub fn list_themes(&self, owner_id: &str) -> Result<Vec<ThemeRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM themes t WHERE t.owner_id = ?1 ORDER BY t.created_at, t.rowid",
                THEME_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], map_theme)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_theme(&self, id: &str, name: Option<&str>, colors: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE themes SET name = COALESCE(?2, name), colors = COALESCE(?3, colors), updated_at = ?4 WHERE id = ?1",
                rusqlite::params![id, name, colors, now()],
            )?;
            Ok(())
        })
    }

    /// Delete a theme, clearing it from anyone who had it active.
    pub fn delete_theme(&self, id: &str) -> Result<bool> {
        self.with_tx(|conn| {
            conn.execute("UPDATE users SET active_theme_id = NULL WHERE active_theme_id = ?1", [id])?;
            let removed = conn.execute("DELETE FROM themes WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    pub fn get_active_theme(&self, user_id: &str) -> Result<Option<ThemeRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM themes t JOIN users u ON u.active_theme_id = t.id WHERE u.id = ?1",
                THEME_COLUMNS
            );
            Ok(conn.query_row(&sql, [user_id], map_theme).optional()?)
        })
    }
}

fn map_theme(row: &Row<'_>) -> rusqlite::Result<ThemeRow> {
    Ok(ThemeRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        colors: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
