use anyhow::Result;

use crate::models::UserSummaryRow;
use crate::queries::users::map_user_summary;
use crate::{Database, now};

impl Database {
    /// Returns false if the follow already existed.
    pub fn follow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![follower_id, followee_id, now()],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Returns false if there was nothing to remove.
    pub fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                [follower_id, followee_id],
            )?;
            Ok(removed > 0)
        })
    }

    /// (followers, following)
    pub fn follow_counts(&self, user_id: &str) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM follows WHERE followee_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
                [user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
    }

    pub fn list_followers(&self, user_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.list_follow_side(
            "SELECT u.id, u.username, u.display_name, u.avatar_upload_id, u.karma
             FROM follows f JOIN users u ON u.id = f.follower_id
             WHERE f.followee_id = ?1 ORDER BY f.created_at DESC",
            user_id,
        )
    }

    pub fn list_following(&self, user_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.list_follow_side(
            "SELECT u.id, u.username, u.display_name, u.avatar_upload_id, u.karma
             FROM follows f JOIN users u ON u.id = f.followee_id
             WHERE f.follower_id = ?1 ORDER BY f.created_at DESC",
            user_id,
        )
    }

    fn list_follow_side(&self, sql: &str, user_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([user_id], map_user_summary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
