use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::CommentRow;
use crate::{Database, now};

/// `?1` is the viewer id (may be NULL).
const COMMENT_SELECT: &str = "
    SELECT c.id, c.post_id, c.author_id, u.username, c.parent_id, c.content, c.created_at, c.edited_at,
           (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id),
           EXISTS (SELECT 1 FROM comment_likes l WHERE l.comment_id = c.id AND l.user_id = ?1)
    FROM comments c
    JOIN users u ON u.id = c.author_id";

impl Database {
    pub fn insert_comment(
        &self,
        id: &str,
        post_id: &str,
        author_id: &str,
        parent_id: Option<&str>,
        content: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, author_id, parent_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, post_id, author_id, parent_id, content, now()],
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, id: &str, viewer: Option<&str>) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE c.id = ?2", COMMENT_SELECT);
            Ok(conn
                .query_row(&sql, rusqlite::params![viewer, id], map_comment)
                .optional()?)
        })
    }

    /// All comments on a post, oldest first. Clients thread them by `parent_id`.
    pub fn list_comments(&self, post_id: &str, viewer: Option<&str>) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE c.post_id = ?2 ORDER BY c.created_at ASC, c.rowid ASC",
                COMMENT_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![viewer, post_id], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_comment(&self, id: &str, content: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE comments SET content = ?2, edited_at = ?3 WHERE id = ?1",
                rusqlite::params![id, content, now()],
            )?;
            Ok(())
        })
    }

    /// Delete a comment and every reply beneath it. Returns how many comments went.
    pub fn delete_comment(&self, id: &str) -> Result<usize> {
        self.with_tx(|conn| delete_comment_cascade(conn, id))
    }
}

pub(crate) fn delete_comment_cascade(conn: &Connection, id: &str) -> Result<usize> {
    const SUBTREE: &str = "
        WITH RECURSIVE subtree(id) AS (
            SELECT ?1
            UNION ALL
            SELECT c.id FROM comments c JOIN subtree s ON c.parent_id = s.id
        )";

    conn.execute(
        &format!("{} DELETE FROM comment_likes WHERE comment_id IN (SELECT id FROM subtree)", SUBTREE),
        [id],
    )?;
    let removed = conn.execute(
        &format!("{} DELETE FROM comments WHERE id IN (SELECT id FROM subtree)", SUBTREE),
        [id],
    )?;
    Ok(removed)
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        parent_id: row.get(4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
        edited_at: row.get(7)?,
        likes: row.get(8)?,
        liked_by_me: row.get(9)?,
    })
}
