use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{NewPost, PostFilter, PostRow};
use crate::{Database, now};

/// Post columns plus author and aggregates. `?1` is the viewer id (may be NULL).
const POST_SELECT: &str = "
    SELECT p.id, p.author_id, u.username, p.community_id, p.category, p.title, p.content,
           p.url, p.upload_id, p.created_at, p.edited_at,
           (SELECT COUNT(*) FROM post_reactions r WHERE r.post_id = p.id AND r.kind = 'like'),
           (SELECT COUNT(*) FROM post_reactions r WHERE r.post_id = p.id AND r.kind = 'dislike'),
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
           (SELECT r.kind FROM post_reactions r WHERE r.post_id = p.id AND r.user_id = ?1)
    FROM posts p
    JOIN users u ON u.id = p.author_id";

impl Database {
    pub fn insert_post(&self, post: &NewPost<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, community_id, category, title, content, url, upload_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    post.id,
                    post.author_id,
                    post.community_id,
                    post.category,
                    post.title,
                    post.content,
                    post.url,
                    post.upload_id,
                    now()
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str, viewer: Option<&str>) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id, viewer))
    }

    /// Newest first. `before` is an exclusive `created_at` cursor.
    pub fn list_posts(
        &self,
        filter: &PostFilter<'_>,
        viewer: Option<&str>,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{}
                 WHERE (?2 IS NULL OR p.category = ?2)
                   AND (?3 IS NULL OR p.community_id = ?3)
                   AND (?4 IS NULL OR p.author_id = ?4)
                   AND (?5 IS NULL OR p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = ?5))
                   AND (?6 IS NULL OR p.created_at < ?6)
                 ORDER BY p.created_at DESC, p.rowid DESC
                 LIMIT ?7",
                POST_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        viewer,
                        filter.category,
                        filter.community_id,
                        filter.author_id,
                        filter.followed_by,
                        before,
                        limit
                    ],
                    map_post,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_post(&self, id: &str, title: Option<&str>, content: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE posts SET
                    title = COALESCE(?2, title),
                    content = COALESCE(?3, content),
                    edited_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id, title, content, now()],
            )?;
            Ok(())
        })
    }

    /// Delete a post with its comments, comment likes and reactions.
    /// Returns false if the post did not exist.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_tx(|conn| delete_post_cascade(conn, id))
    }
}

pub(crate) fn query_post(conn: &Connection, id: &str, viewer: Option<&str>) -> Result<Option<PostRow>> {
    let sql = format!("{} WHERE p.id = ?2", POST_SELECT);
    Ok(conn
        .query_row(&sql, rusqlite::params![viewer, id], map_post)
        .optional()?)
}

/// Children go first so foreign keys hold at every statement boundary.
pub(crate) fn delete_post_cascade(conn: &Connection, id: &str) -> Result<bool> {
    conn.execute(
        "DELETE FROM comment_likes WHERE comment_id IN (SELECT id FROM comments WHERE post_id = ?1)",
        [id],
    )?;
    conn.execute("DELETE FROM comments WHERE post_id = ?1", [id])?;
    conn.execute("DELETE FROM post_reactions WHERE post_id = ?1", [id])?;
    let removed = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_username: row.get(2)?,
        community_id: row.get(3)?,
        category: row.get(4)?,
        title: row.get(5)?,
        content: row.get(6)?,
        url: row.get(7)?,
        upload_id: row.get(8)?,
        created_at: row.get(9)?,
        edited_at: row.get(10)?,
        likes: row.get(11)?,
        dislikes: row.get(12)?,
        comment_count: row.get(13)?,
        my_reaction: row.get(14)?,
    })
}
