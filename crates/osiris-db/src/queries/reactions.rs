use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::models::{CommentLikeOutcome, PostReactionOutcome};
use crate::queries::users::adjust_karma;
use crate::{Database, now};

fn karma_of(kind: Option<&str>) -> i64 {
    match kind {
        Some("like") => 1,
        Some("dislike") => -1,
        _ => 0,
    }
}

impl Database {
    /// Toggle `user_id`'s reaction on a post.
    ///
    /// Same kind again removes it, a different kind replaces it. The author's
    /// karma moves by the difference in the same transaction; reacting to your
    /// own post leaves karma alone. Returns `None` if the post does not exist.
    pub fn toggle_post_reaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: &str,
    ) -> Result<Option<PostReactionOutcome>> {
        self.with_tx(|conn| {
            let post: Option<(String, Option<String>)> = conn
                .query_row(
                    "SELECT author_id, community_id FROM posts WHERE id = ?1",
                    [post_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((author_id, community_id)) = post else {
                return Ok(None);
            };

            let previous: Option<String> = conn
                .query_row(
                    "SELECT kind FROM post_reactions WHERE post_id = ?1 AND user_id = ?2",
                    [post_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            let current = match previous.as_deref() {
                Some(existing) if existing == kind => {
                    conn.execute(
                        "DELETE FROM post_reactions WHERE post_id = ?1 AND user_id = ?2",
                        [post_id, user_id],
                    )?;
                    None
                }
                Some(_) => {
                    conn.execute(
                        "UPDATE post_reactions SET kind = ?3, created_at = ?4 WHERE post_id = ?1 AND user_id = ?2",
                        rusqlite::params![post_id, user_id, kind, now()],
                    )?;
                    Some(kind.to_string())
                }
                None => {
                    conn.execute(
                        "INSERT INTO post_reactions (post_id, user_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![post_id, user_id, kind, now()],
                    )?;
                    Some(kind.to_string())
                }
            };

            if author_id != user_id {
                let delta = karma_of(current.as_deref()) - karma_of(previous.as_deref());
                adjust_karma(conn, &author_id, delta)?;
            }

            let (likes, dislikes) = reaction_counts(conn, post_id)?;
            Ok(Some(PostReactionOutcome {
                author_id,
                community_id,
                previous,
                current,
                likes,
                dislikes,
            }))
        })
    }

    /// Toggle a like on a comment, moving the author's karma by one.
    /// Returns `None` if the comment does not exist.
    pub fn toggle_comment_like(&self, comment_id: &str, user_id: &str) -> Result<Option<CommentLikeOutcome>> {
        self.with_tx(|conn| {
            let author_id: Option<String> = conn
                .query_row("SELECT author_id FROM comments WHERE id = ?1", [comment_id], |row| row.get(0))
                .optional()?;
            let Some(author_id) = author_id else {
                return Ok(None);
            };

            let removed = conn.execute(
                "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
                [comment_id, user_id],
            )?;
            let liked = removed == 0;
            if liked {
                conn.execute(
                    "INSERT INTO comment_likes (comment_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![comment_id, user_id, now()],
                )?;
            }

            if author_id != user_id {
                adjust_karma(conn, &author_id, if liked { 1 } else { -1 })?;
            }

            let likes: i64 = conn.query_row(
                "SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?1",
                [comment_id],
                |row| row.get(0),
            )?;
            Ok(Some(CommentLikeOutcome {
                author_id,
                liked,
                likes,
            }))
        })
    }
}

fn reaction_counts(conn: &Connection, post_id: &str) -> Result<(i64, i64)> {
    Ok(conn.query_row(
        "SELECT
            COALESCE(SUM(kind = 'like'), 0),
            COALESCE(SUM(kind = 'dislike'), 0)
         FROM post_reactions WHERE post_id = ?1",
        [post_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::queries::fixtures;

    fn karma(db: &Database, user: &str) -> i64 {
        db.get_user(user).unwrap().unwrap().karma
    }

    #[test]
    fn like_then_unlike_restores_karma() {
        let db = Database::open_in_memory().unwrap();
        let author = fixtures::user(&db, "author");
        let fan = fixtures::user(&db, "fan");
        let post = fixtures::post(&db, &author, None);

        let first = db.toggle_post_reaction(&post, &fan, "like").unwrap().unwrap();
        assert_eq!(first.current.as_deref(), Some("like"));
        assert_eq!(first.likes, 1);
        assert_eq!(karma(&db, &author), 1);

        let second = db.toggle_post_reaction(&post, &fan, "like").unwrap().unwrap();
        assert_eq!(second.current, None);
        assert_eq!(second.likes, 0);
        assert_eq!(karma(&db, &author), 0);
    }

    #[test]
    fn switching_kind_moves_karma_by_two() {
        let db = Database::open_in_memory().unwrap();
        let author = fixtures::user(&db, "author");
        let critic = fixtures::user(&db, "critic");
        let post = fixtures::post(&db, &author, None);

        db.toggle_post_reaction(&post, &critic, "like").unwrap();
        let switched = db.toggle_post_reaction(&post, &critic, "dislike").unwrap().unwrap();
        assert_eq!(switched.previous.as_deref(), Some("like"));
        assert_eq!((switched.likes, switched.dislikes), (0, 1));
        assert_eq!(karma(&db, &author), -1);
    }

    #[test]
    fn self_reactions_do_not_farm_karma() {
        let db = Database::open_in_memory().unwrap();
        let author = fixtures::user(&db, "author");
        let post = fixtures::post(&db, &author, None);
        let comment = fixtures::comment(&db, &post, &author, None);

        db.toggle_post_reaction(&post, &author, "like").unwrap();
        db.toggle_comment_like(&comment, &author).unwrap();
        assert_eq!(karma(&db, &author), 0);
    }

    #[test]
    fn comment_like_toggles() {
        let db = Database::open_in_memory().unwrap();
        let author = fixtures::user(&db, "author");
        let fan = fixtures::user(&db, "fan");
        let post = fixtures::post(&db, &author, None);
        let comment = fixtures::comment(&db, &post, &author, None);

        let liked = db.toggle_comment_like(&comment, &fan).unwrap().unwrap();
        assert!(liked.liked);
        assert_eq!(karma(&db, &author), 1);
        let unliked = db.toggle_comment_like(&comment, &fan).unwrap().unwrap();
        assert!(!unliked.liked);
        assert_eq!(unliked.likes, 0);
        assert_eq!(karma(&db, &author), 0);
    }

    #[test]
    fn missing_targets_return_none() {
        let db = Database::open_in_memory().unwrap();
        let user = fixtures::user(&db, "user");
        assert!(db.toggle_post_reaction("nope", &user, "like").unwrap().is_none());
        assert!(db.toggle_comment_like("nope", &user).unwrap().is_none());
    }
}
