//! Database row types. These map directly to SQLite rows and stay
//! independent of the osiris-types wire models.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub bio: String,
    pub avatar_upload_id: Option<String>,
    pub karma: i64,
    pub is_admin: bool,
    pub active_theme_id: Option<String>,
    pub created_at: String,
}

pub struct UserSummaryRow {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_upload_id: Option<String>,
    pub karma: i64,
}

pub struct UploadRow {
    pub id: String,
    pub owner_id: String,
    pub mime: String,
    pub kind: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: String,
}

pub struct NewPost<'a> {
    pub id: &'a str,
    pub author_id: &'a str,
    pub community_id: Option<&'a str>,
    pub category: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub url: Option<&'a str>,
    pub upload_id: Option<&'a str>,
}

/// A post joined with its author and aggregate counts.
pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub community_id: Option<String>,
    pub category: String,
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub upload_id: Option<String>,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
    pub comment_count: i64,
    /// The viewer's own reaction, when a viewer was given.
    pub my_reaction: Option<String>,
}

#[derive(Default)]
pub struct PostFilter<'a> {
    pub category: Option<&'a str>,
    pub community_id: Option<&'a str>,
    pub author_id: Option<&'a str>,
    /// Only posts by users this user follows.
    pub followed_by: Option<&'a str>,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_username: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub likes: i64,
    pub liked_by_me: bool,
}

/// Result of toggling a post reaction.
pub struct PostReactionOutcome {
    pub author_id: String,
    pub community_id: Option<String>,
    pub previous: Option<String>,
    pub current: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
}

pub struct CommentLikeOutcome {
    pub author_id: String,
    pub liked: bool,
    pub likes: i64,
}

pub struct CommunityRow {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    /// Comma-separated post categories.
    pub allowed_categories: String,
    pub created_at: String,
    pub member_count: i64,
}

pub struct MemberRow {
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub joined_at: String,
}

pub struct BanRow {
    pub user_id: String,
    pub username: String,
    pub banned_by: String,
    pub reason: String,
    pub created_at: String,
}

pub struct ReportRow {
    pub id: String,
    pub reporter_id: String,
    pub target_type: String,
    pub target_id: String,
    pub community_id: Option<String>,
    pub reason: String,
    pub status: String,
    pub resolved_by: Option<String>,
    pub resolution_note: Option<String>,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

pub struct ThemeRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// JSON object of slot name to hex colour.
    pub colors: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub created_at: String,
    pub read_at: Option<String>,
}

pub struct ConversationRow {
    pub partner: UserSummaryRow,
    pub last_message: MessageRow,
    pub unread: i64,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub actor_id: Option<String>,
    pub actor_username: Option<String>,
    pub target_id: Option<String>,
    pub body: String,
    pub read: bool,
    pub created_at: String,
}
