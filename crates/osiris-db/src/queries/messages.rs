use anyhow::Result;
use rusqlite::Row;

use crate::models::{ConversationRow, MessageRow, UserSummaryRow};
use crate::{Database, now};

impl Database {
    pub fn insert_message(&self, id: &str, sender_id: &str, recipient_id: &str, content: &str) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let created_at = now();
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, sender_id, recipient_id, content, created_at],
            )?;
            Ok(MessageRow {
                id: id.to_string(),
                sender_id: sender_id.to_string(),
                recipient_id: recipient_id.to_string(),
                content: content.to_string(),
                created_at,
                read_at: None,
            })
        })
    }

    /// Messages between two users, newest first.
    pub fn list_thread(&self, user_a: &str, user_b: &str, limit: u32, before: Option<&str>) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, recipient_id, content, created_at, read_at
                 FROM messages
                 WHERE ((sender_id = ?1 AND recipient_id = ?2) OR (sender_id = ?2 AND recipient_id = ?1))
                   AND (?3 IS NULL OR created_at < ?3)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?4",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_a, user_b, before, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// One entry per conversation partner with the latest message and the
    /// number of unread messages from that partner. Most recent first.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.sender_id, m.recipient_id, m.content, m.created_at, m.read_at,
                        u.id, u.username, u.display_name, u.avatar_upload_id, u.karma,
                        (SELECT COUNT(*) FROM messages x
                          WHERE x.sender_id = m.partner_id AND x.recipient_id = ?1 AND x.read_at IS NULL)
                 FROM (
                     SELECT id, sender_id, recipient_id, content, created_at, read_at, rowid AS seq,
                            CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END AS partner_id,
                            ROW_NUMBER() OVER (
                                PARTITION BY CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END
                                ORDER BY created_at DESC, rowid DESC
                            ) AS rn
                     FROM messages
                     WHERE sender_id = ?1 OR recipient_id = ?1
                 ) m
                 JOIN users u ON u.id = m.partner_id
                 WHERE m.rn = 1
                 ORDER BY m.created_at DESC, m.seq DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationRow {
                        last_message: map_message(row)?,
                        partner: UserSummaryRow {
                            id: row.get(6)?,
                            username: row.get(7)?,
                            display_name: row.get(8)?,
                            avatar_upload_id: row.get(9)?,
                            karma: row.get(10)?,
                        },
                        unread: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark everything `partner_id` sent to `reader_id` as read. Returns the count.
    pub fn mark_thread_read(&self, reader_id: &str, partner_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET read_at = ?3 WHERE recipient_id = ?1 AND sender_id = ?2 AND read_at IS NULL",
                rusqlite::params![reader_id, partner_id, now()],
            )?;
            Ok(updated)
        })
    }
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        read_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::queries::fixtures;

    #[test]
    fn conversations_summarise_latest_and_unread() {
        let db = Database::open_in_memory().unwrap();
        let me = fixtures::user(&db, "me");
        let ann = fixtures::user(&db, "ann");
        let ben = fixtures::user(&db, "ben");

        db.insert_message("m1", &ann, &me, "hi").unwrap();
        db.insert_message("m2", &ann, &me, "you there?").unwrap();
        db.insert_message("m3", &me, &ben, "hello ben").unwrap();

        let convos = db.list_conversations(&me).unwrap();
        assert_eq!(convos.len(), 2);
        assert_eq!(convos[0].partner.username, "ben");
        assert_eq!(convos[0].unread, 0);
        assert_eq!(convos[1].last_message.content, "you there?");
        assert_eq!(convos[1].unread, 2);

        assert_eq!(db.mark_thread_read(&me, &ann).unwrap(), 2);
        assert_eq!(db.mark_thread_read(&me, &ann).unwrap(), 0);
    }

    #[test]
    fn thread_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = fixtures::user(&db, "a");
        let b = fixtures::user(&db, "b");
        db.insert_message("m1", &a, &b, "one").unwrap();
        db.insert_message("m2", &b, &a, "two").unwrap();

        let thread = db.list_thread(&a, &b, 50, None).unwrap();
        assert_eq!(thread.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["m2", "m1"]);
    }
}
