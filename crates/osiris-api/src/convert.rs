//! Row to response conversions. Ids and timestamps are written by this
//! server, so a corrupt value is logged and replaced rather than failing the
//! whole request. Unknown enum strings are real errors.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use osiris_db::models::{
    BanRow, CommentRow, CommunityRow, ConversationRow, MemberRow, MessageRow, NotificationRow,
    PostRow, ReportRow, ThemeRow, UserRow, UserSummaryRow,
};
use osiris_types::api::{
    BanResponse, CommentResponse, CommunityResponse, ConversationSummary, MemberResponse,
    MessageResponse, NotificationResponse, PostResponse, PublicProfile, ReportResponse,
    ThemeResponse, UserProfile, UserSummary,
};
use osiris_types::models::{PostCategory, UnknownVariant};

use crate::error::ApiError;

pub(crate) fn id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

pub(crate) fn opt_id(raw: Option<&str>) -> Option<Uuid> {
    raw.map(id)
}

pub(crate) fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::<Utc>::default()
        })
}

pub(crate) fn opt_ts(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.map(ts)
}

/// Normalise a `before` query cursor to the stored timestamp format.
pub(crate) fn cursor(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| osiris_db::format_ts(t.with_timezone(&Utc)))
            .map_err(|_| ApiError::bad_request("'before' must be an RFC 3339 timestamp"))
    })
    .transpose()
}

pub(crate) fn parse<T>(raw: &str) -> anyhow::Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    Ok(raw.parse::<T>()?)
}

fn count(n: i64) -> u64 {
    n.max(0) as u64
}

/// Stored form of a community's allowed categories.
pub(crate) fn join_categories(categories: &[PostCategory]) -> String {
    categories.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(",")
}

pub(crate) fn split_categories(raw: &str) -> anyhow::Result<Vec<PostCategory>> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(parse::<PostCategory>)
        .collect()
}

pub(crate) fn user_profile(row: UserRow) -> UserProfile {
    UserProfile {
        id: id(&row.id),
        username: row.username,
        display_name: row.display_name,
        bio: row.bio,
        avatar_upload_id: opt_id(row.avatar_upload_id.as_deref()),
        karma: row.karma,
        is_admin: row.is_admin,
        active_theme_id: opt_id(row.active_theme_id.as_deref()),
        created_at: ts(&row.created_at),
    }
}

pub(crate) fn public_profile(row: UserRow, followers: i64, following: i64) -> PublicProfile {
    PublicProfile {
        id: id(&row.id),
        username: row.username,
        display_name: row.display_name,
        bio: row.bio,
        avatar_upload_id: opt_id(row.avatar_upload_id.as_deref()),
        karma: row.karma,
        follower_count: count(followers),
        following_count: count(following),
        created_at: ts(&row.created_at),
    }
}

pub(crate) fn user_summary(row: UserSummaryRow) -> UserSummary {
    UserSummary {
        id: id(&row.id),
        username: row.username,
        display_name: row.display_name,
        avatar_upload_id: opt_id(row.avatar_upload_id.as_deref()),
        karma: row.karma,
    }
}

pub(crate) fn post(row: PostRow) -> anyhow::Result<PostResponse> {
    let category = parse(&row.category).with_context(|| format!("post {}", row.id))?;
    let my_reaction = row.my_reaction.as_deref().map(parse).transpose()?;
    Ok(PostResponse {
        id: id(&row.id),
        author_id: id(&row.author_id),
        author_username: row.author_username,
        community_id: opt_id(row.community_id.as_deref()),
        category,
        title: row.title,
        content: row.content,
        url: row.url,
        upload_id: opt_id(row.upload_id.as_deref()),
        likes: count(row.likes),
        dislikes: count(row.dislikes),
        comment_count: count(row.comment_count),
        my_reaction,
        created_at: ts(&row.created_at),
        edited_at: opt_ts(row.edited_at.as_deref()),
    })
}

pub(crate) fn posts(rows: Vec<PostRow>) -> anyhow::Result<Vec<PostResponse>> {
    rows.into_iter().map(post).collect()
}

pub(crate) fn comment(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: id(&row.id),
        post_id: id(&row.post_id),
        author_id: id(&row.author_id),
        author_username: row.author_username,
        parent_id: opt_id(row.parent_id.as_deref()),
        content: row.content,
        likes: count(row.likes),
        liked_by_me: row.liked_by_me,
        created_at: ts(&row.created_at),
        edited_at: opt_ts(row.edited_at.as_deref()),
    }
}

pub(crate) fn community(row: CommunityRow) -> anyhow::Result<CommunityResponse> {
    let allowed_categories =
        split_categories(&row.allowed_categories).with_context(|| format!("community {}", row.slug))?;
    Ok(CommunityResponse {
        id: id(&row.id),
        slug: row.slug,
        name: row.name,
        description: row.description,
        owner_id: id(&row.owner_id),
        allowed_categories,
        member_count: count(row.member_count),
        created_at: ts(&row.created_at),
    })
}

pub(crate) fn member(row: MemberRow) -> anyhow::Result<MemberResponse> {
    Ok(MemberResponse {
        user_id: id(&row.user_id),
        role: parse(&row.role)?,
        username: row.username,
        joined_at: ts(&row.joined_at),
    })
}

pub(crate) fn ban(row: BanRow) -> BanResponse {
    BanResponse {
        user_id: id(&row.user_id),
        username: row.username,
        banned_by: id(&row.banned_by),
        reason: row.reason,
        created_at: ts(&row.created_at),
    }
}

pub(crate) fn report(row: ReportRow) -> anyhow::Result<ReportResponse> {
    Ok(ReportResponse {
        id: id(&row.id),
        reporter_id: id(&row.reporter_id),
        target_type: parse(&row.target_type)?,
        target_id: id(&row.target_id),
        community_id: opt_id(row.community_id.as_deref()),
        reason: row.reason,
        status: parse(&row.status)?,
        resolved_by: opt_id(row.resolved_by.as_deref()),
        resolution_note: row.resolution_note,
        created_at: ts(&row.created_at),
        resolved_at: opt_ts(row.resolved_at.as_deref()),
    })
}

pub(crate) fn theme(row: ThemeRow, active_theme_id: Option<&str>) -> anyhow::Result<ThemeResponse> {
    let colors: BTreeMap<String, String> =
        serde_json::from_str(&row.colors).with_context(|| format!("theme {} colours", row.id))?;
    Ok(ThemeResponse {
        active: active_theme_id == Some(row.id.as_str()),
        id: id(&row.id),
        name: row.name,
        colors,
        created_at: ts(&row.created_at),
        updated_at: ts(&row.updated_at),
    })
}

pub(crate) fn message(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: id(&row.id),
        sender_id: id(&row.sender_id),
        recipient_id: id(&row.recipient_id),
        content: row.content,
        created_at: ts(&row.created_at),
        read_at: opt_ts(row.read_at.as_deref()),
    }
}

pub(crate) fn conversation(row: ConversationRow) -> ConversationSummary {
    ConversationSummary {
        partner: user_summary(row.partner),
        last_message: message(row.last_message),
        unread: count(row.unread),
    }
}

pub(crate) fn notification(row: NotificationRow) -> anyhow::Result<NotificationResponse> {
    Ok(NotificationResponse {
        id: id(&row.id),
        kind: parse(&row.kind)?,
        actor_id: opt_id(row.actor_id.as_deref()),
        actor_username: row.actor_username,
        target_id: opt_id(row.target_id.as_deref()),
        body: row.body,
        read: row.read,
        created_at: ts(&row.created_at),
    })
}
