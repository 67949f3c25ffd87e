use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id               TEXT PRIMARY KEY,
            username         TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password         TEXT NOT NULL,
            display_name     TEXT NOT NULL,
            bio              TEXT NOT NULL DEFAULT '',
            avatar_upload_id TEXT,
            karma            INTEGER NOT NULL DEFAULT 0,
            is_admin         INTEGER NOT NULL DEFAULT 0,
            active_theme_id  TEXT,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS uploads (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL REFERENCES users(id),
            mime        TEXT NOT NULL,
            kind        TEXT NOT NULL,
            size        INTEGER NOT NULL,
            sha256      TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS communities (
            id                  TEXT PRIMARY KEY,
            slug                TEXT NOT NULL UNIQUE,
            name                TEXT NOT NULL,
            description         TEXT NOT NULL DEFAULT '',
            owner_id            TEXT NOT NULL REFERENCES users(id),
            allowed_categories  TEXT NOT NULL,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS community_members (
            community_id  TEXT NOT NULL REFERENCES communities(id),
            user_id       TEXT NOT NULL REFERENCES users(id),
            role          TEXT NOT NULL,
            joined_at     TEXT NOT NULL,
            PRIMARY KEY (community_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS community_bans (
            community_id  TEXT NOT NULL REFERENCES communities(id),
            user_id       TEXT NOT NULL REFERENCES users(id),
            banned_by     TEXT NOT NULL REFERENCES users(id),
            reason        TEXT NOT NULL DEFAULT '',
            created_at    TEXT NOT NULL,
            PRIMARY KEY (community_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS posts (
            id            TEXT PRIMARY KEY,
            author_id     TEXT NOT NULL REFERENCES users(id),
            community_id  TEXT REFERENCES communities(id),
            category      TEXT NOT NULL,
            title         TEXT NOT NULL,
            content       TEXT NOT NULL DEFAULT '',
            url           TEXT,
            upload_id     TEXT REFERENCES uploads(id),
            created_at    TEXT NOT NULL,
            edited_at     TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);
        CREATE INDEX IF NOT EXISTS idx_posts_community
            ON posts(community_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_posts_author
            ON posts(author_id, created_at);

        CREATE TABLE IF NOT EXISTS post_reactions (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            kind        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id),
            author_id   TEXT NOT NULL REFERENCES users(id),
            parent_id   TEXT REFERENCES comments(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            edited_at   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_comments_parent
            ON comments(parent_id);

        CREATE TABLE IF NOT EXISTS comment_likes (
            comment_id  TEXT NOT NULL REFERENCES comments(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (comment_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS follows (
            follower_id  TEXT NOT NULL REFERENCES users(id),
            followee_id  TEXT NOT NULL REFERENCES users(id),
            created_at   TEXT NOT NULL,
            PRIMARY KEY (follower_id, followee_id)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_followee
            ON follows(followee_id);

        -- target_id and community_id are plain references: reports outlive their targets
        CREATE TABLE IF NOT EXISTS reports (
            id               TEXT PRIMARY KEY,
            reporter_id      TEXT NOT NULL REFERENCES users(id),
            target_type      TEXT NOT NULL,
            target_id        TEXT NOT NULL,
            community_id     TEXT,
            reason           TEXT NOT NULL,
            status           TEXT NOT NULL DEFAULT 'pending',
            resolved_by      TEXT REFERENCES users(id),
            resolution_note  TEXT,
            created_at       TEXT NOT NULL,
            resolved_at      TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_reports_target
            ON reports(target_id, status);

        CREATE TABLE IF NOT EXISTS themes (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL REFERENCES users(id),
            name        TEXT NOT NULL,
            colors      TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id            TEXT PRIMARY KEY,
            sender_id     TEXT NOT NULL REFERENCES users(id),
            recipient_id  TEXT NOT NULL REFERENCES users(id),
            content       TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            read_at       TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(sender_id, recipient_id, created_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            kind        TEXT NOT NULL,
            actor_id    TEXT REFERENCES users(id),
            target_id   TEXT,
            body        TEXT NOT NULL,
            read        INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
