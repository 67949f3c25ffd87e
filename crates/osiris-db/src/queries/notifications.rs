use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::models::NotificationRow;
use crate::{Database, now};

const NOTIFICATION_SELECT: &str = "
    SELECT n.id, n.user_id, n.kind, n.actor_id, u.username, n.target_id, n.body, n.read, n.created_at
    FROM notifications n
    LEFT JOIN users u ON u.id = n.actor_id";

impl Database {
    pub fn insert_notification(
        &self,
        id: &str,
        user_id: &str,
        kind: &str,
        actor_id: Option<&str>,
        target_id: Option<&str>,
        body: &str,
    ) -> Result<NotificationRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, actor_id, target_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, user_id, kind, actor_id, target_id, body, now()],
            )?;
            let sql = format!("{} WHERE n.id = ?1", NOTIFICATION_SELECT);
            Ok(conn.query_row(&sql, [id], map_notification)?)
        })
    }

    pub fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE n.user_id = ?1
                   AND (?2 = 0 OR n.read = 0)
                   AND (?3 IS NULL OR n.created_at < ?3)
                 ORDER BY n.created_at DESC, n.rowid DESC
                 LIMIT ?4",
                NOTIFICATION_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, unread_only, before, limit], map_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn unread_notification_count(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                [user_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Only the owner's notifications can be touched; returns false otherwise.
    pub fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM notifications WHERE id = ?1 AND user_id = ?2",
                    [id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(false);
            }
            conn.execute("UPDATE notifications SET read = 1 WHERE id = ?1", [id])?;
            Ok(true)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id],
            )?)
        })
    }

    pub fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
            )?;
            Ok(removed > 0)
        })
    }
}

fn map_notification(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        actor_id: row.get(3)?,
        actor_username: row.get(4)?,
        target_id: row.get(5)?,
        body: row.get(6)?,
        read: row.get(7)?,
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::queries::fixtures;

    #[test]
    fn unread_filter_and_ownership() {
        let db = Database::open_in_memory().unwrap();
        let me = fixtures::user(&db, "me");
        let other = fixtures::user(&db, "other");
        let first = db
            .insert_notification("n1", &me, "new_follower", Some(&other), Some(&other), "other followed you")
            .unwrap();
        assert_eq!(first.actor_username.as_deref(), Some("other"));
        db.insert_notification("n2", &me, "new_comment", Some(&other), None, "comment").unwrap();

        assert_eq!(db.unread_notification_count(&me).unwrap(), 2);
        assert!(!db.mark_notification_read("n1", &other).unwrap());
        assert!(db.mark_notification_read("n1", &me).unwrap());
        assert_eq!(db.list_notifications(&me, true, 50, None).unwrap().len(), 1);
        assert_eq!(db.list_notifications(&me, false, 50, None).unwrap().len(), 2);

        assert_eq!(db.mark_all_notifications_read(&me).unwrap(), 1);
        assert!(!db.delete_notification("n2", &other).unwrap());
        assert!(db.delete_notification("n2", &me).unwrap());
    }
}
