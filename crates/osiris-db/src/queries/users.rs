use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{UserRow, UserSummaryRow};
use crate::{Database, now};

const USER_COLUMNS: &str = "id, username, password, display_name, bio, avatar_upload_id, karma, is_admin, active_theme_id, created_at";

impl Database {
    /// Insert a user. The first account ever created becomes an admin.
    /// Returns whether the new user is an admin, or `None` when the username
    /// is already taken (case-insensitively).
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<Option<bool>> {
        self.with_tx(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )?;
            if taken {
                return Ok(None);
            }
            let existing: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            let is_admin = existing == 0;
            conn.execute(
                "INSERT INTO users (id, username, password, display_name, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, username, password_hash, display_name, is_admin, now()],
            )?;
            Ok(Some(is_admin))
        })
    }

    /// Case-insensitive lookup.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
            Ok(conn.query_row(&sql, [username], map_user).optional()?)
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        bio: Option<&str>,
        avatar_upload_id: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    display_name = COALESCE(?2, display_name),
                    bio = COALESCE(?3, bio),
                    avatar_upload_id = COALESCE(?4, avatar_upload_id)
                 WHERE id = ?1",
                rusqlite::params![id, display_name, bio, avatar_upload_id],
            )?;
            Ok(())
        })
    }

    pub fn set_active_theme(&self, user_id: &str, theme_id: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET active_theme_id = ?2 WHERE id = ?1",
                rusqlite::params![user_id, theme_id],
            )?;
            Ok(())
        })
    }

    pub fn get_user_summary(&self, id: &str) -> Result<Option<UserSummaryRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, username, display_name, avatar_upload_id, karma FROM users WHERE id = ?1",
                    [id],
                    map_user_summary,
                )
                .optional()?)
        })
    }
}

pub(crate) fn query_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [id], map_user).optional()?)
}

/// Shift a user's karma. Callers run this inside the transaction that
/// changed the reaction, so the two never drift apart.
pub(crate) fn adjust_karma(conn: &Connection, user_id: &str, delta: i64) -> Result<()> {
    if delta != 0 {
        conn.execute(
            "UPDATE users SET karma = karma + ?2 WHERE id = ?1",
            rusqlite::params![user_id, delta],
        )?;
    }
    Ok(())
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        display_name: row.get(3)?,
        bio: row.get(4)?,
        avatar_upload_id: row.get(5)?,
        karma: row.get(6)?,
        is_admin: row.get(7)?,
        active_theme_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Expects columns `id, username, display_name, avatar_upload_id, karma`.
pub(crate) fn map_user_summary(row: &Row<'_>) -> rusqlite::Result<UserSummaryRow> {
    Ok(UserSummaryRow {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        avatar_upload_id: row.get(3)?,
        karma: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::queries::fixtures;

    #[test]
    fn first_user_is_admin() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.create_user("a", "alice", "h", "Alice").unwrap(), Some(true));
        assert_eq!(db.create_user("b", "bob", "h", "Bob").unwrap(), Some(false));
        assert!(db.get_user("a").unwrap().unwrap().is_admin);
    }

    #[test]
    fn usernames_are_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        fixtures::user(&db, "Alice");
        assert!(db.get_user_by_username("alice").unwrap().is_some());
        assert_eq!(db.create_user("x", "ALICE", "h", "dup").unwrap(), None);
        assert!(db.get_user("x").unwrap().is_none());
    }

    #[test]
    fn profile_update_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let id = fixtures::user(&db, "carol");
        db.update_profile(&id, None, Some("hello"), None).unwrap();
        let user = db.get_user(&id).unwrap().unwrap();
        assert_eq!(user.display_name, "carol");
        assert_eq!(user.bio, "hello");
    }
}
