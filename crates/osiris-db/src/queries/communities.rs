use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{BanRow, CommunityRow, MemberRow};
use crate::queries::posts::delete_post_cascade;
use crate::{Database, now};

const COMMUNITY_SELECT: &str = "
    SELECT c.id, c.slug, c.name, c.description, c.owner_id, c.allowed_categories, c.created_at,
           (SELECT COUNT(*) FROM community_members m WHERE m.community_id = c.id)
    FROM communities c";

impl Database {
    /// Insert a community and make its creator the owner.
    /// Returns `false` without writing anything when the slug is taken.
    pub fn create_community(
        &self,
        id: &str,
        slug: &str,
        name: &str,
        description: &str,
        owner_id: &str,
        allowed_categories: &str,
    ) -> Result<bool> {
        self.with_tx(|conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM communities WHERE slug = ?1)",
                [slug],
                |row| row.get(0),
            )?;
            if taken {
                return Ok(false);
            }
            let created_at = now();
            conn.execute(
                "INSERT INTO communities (id, slug, name, description, owner_id, allowed_categories, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, slug, name, description, owner_id, allowed_categories, created_at],
            )?;
            conn.execute(
                "INSERT INTO community_members (community_id, user_id, role, joined_at) VALUES (?1, ?2, 'owner', ?3)",
                rusqlite::params![id, owner_id, created_at],
            )?;
            Ok(true)
        })
    }

    pub fn get_community_by_slug(&self, slug: &str) -> Result<Option<CommunityRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE c.slug = ?1", COMMUNITY_SELECT);
            Ok(conn.query_row(&sql, [slug], map_community).optional()?)
        })
    }

    pub fn get_community(&self, id: &str) -> Result<Option<CommunityRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE c.id = ?1", COMMUNITY_SELECT);
            Ok(conn.query_row(&sql, [id], map_community).optional()?)
        })
    }

    pub fn list_communities(&self) -> Result<Vec<CommunityRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} ORDER BY c.name COLLATE NOCASE", COMMUNITY_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_community)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_community(
        &self,
        id: &str,
        description: Option<&str>,
        allowed_categories: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE communities SET
                    description = COALESCE(?2, description),
                    allowed_categories = COALESCE(?3, allowed_categories)
                 WHERE id = ?1",
                rusqlite::params![id, description, allowed_categories],
            )?;
            Ok(())
        })
    }

    /// Delete a community with all its posts, members and bans.
    /// Reports survive but lose their community link.
    pub fn delete_community(&self, id: &str) -> Result<bool> {
        self.with_tx(|conn| {
            let post_ids: Vec<String> = {
                let mut stmt = conn.prepare("SELECT id FROM posts WHERE community_id = ?1")?;
                stmt.query_map([id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };
            for post_id in &post_ids {
                delete_post_cascade(conn, post_id)?;
            }
            conn.execute("DELETE FROM community_members WHERE community_id = ?1", [id])?;
            conn.execute("DELETE FROM community_bans WHERE community_id = ?1", [id])?;
            conn.execute("UPDATE reports SET community_id = NULL WHERE community_id = ?1", [id])?;
            let removed = conn.execute("DELETE FROM communities WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    // -- Membership --

    pub fn get_membership(&self, community_id: &str, user_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| query_membership(conn, community_id, user_id))
    }

    /// Returns false if the user was already a member.
    pub fn add_member(&self, community_id: &str, user_id: &str, role: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO community_members (community_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![community_id, user_id, role, now()],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn remove_member(&self, community_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM community_members WHERE community_id = ?1 AND user_id = ?2",
                [community_id, user_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn set_member_role(&self, community_id: &str, user_id: &str, role: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE community_members SET role = ?3 WHERE community_id = ?1 AND user_id = ?2",
                [community_id, user_id, role],
            )?;
            Ok(updated > 0)
        })
    }

    /// Owner first, then moderators, then members by join date.
    pub fn list_members(&self, community_id: &str) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.user_id, u.username, m.role, m.joined_at
                 FROM community_members m JOIN users u ON u.id = m.user_id
                 WHERE m.community_id = ?1
                 ORDER BY CASE m.role WHEN 'owner' THEN 0 WHEN 'moderator' THEN 1 ELSE 2 END, m.joined_at",
            )?;
            let rows = stmt
                .query_map([community_id], |row| {
                    Ok(MemberRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        role: row.get(2)?,
                        joined_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Communities where the user is a moderator or owner.
    pub fn moderated_community_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT community_id FROM community_members WHERE user_id = ?1 AND role IN ('moderator', 'owner')",
            )?;
            let rows = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Bans --

    pub fn is_banned(&self, community_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM community_bans WHERE community_id = ?1 AND user_id = ?2)",
                [community_id, user_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Ban a user: drops their membership and records the ban.
    pub fn ban_member(&self, community_id: &str, user_id: &str, banned_by: &str, reason: &str) -> Result<()> {
        self.with_tx(|conn| {
            conn.execute(
                "DELETE FROM community_members WHERE community_id = ?1 AND user_id = ?2",
                [community_id, user_id],
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO community_bans (community_id, user_id, banned_by, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![community_id, user_id, banned_by, reason, now()],
            )?;
            Ok(())
        })
    }

    pub fn unban_member(&self, community_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM community_bans WHERE community_id = ?1 AND user_id = ?2",
                [community_id, user_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn list_bans(&self, community_id: &str) -> Result<Vec<BanRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT b.user_id, u.username, b.banned_by, b.reason, b.created_at
                 FROM community_bans b JOIN users u ON u.id = b.user_id
                 WHERE b.community_id = ?1 ORDER BY b.created_at DESC",
            )?;
            let rows = stmt
                .query_map([community_id], |row| {
                    Ok(BanRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        banned_by: row.get(2)?,
                        reason: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn query_membership(conn: &Connection, community_id: &str, user_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT role FROM community_members WHERE community_id = ?1 AND user_id = ?2",
            [community_id, user_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn map_community(row: &Row<'_>) -> rusqlite::Result<CommunityRow> {
    Ok(CommunityRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        owner_id: row.get(4)?,
        allowed_categories: row.get(5)?,
        created_at: row.get(6)?,
        member_count: row.get(7)?,
    })
}
