use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use osiris_types::api::{Claims, CreateCommentRequest, UpdateCommentRequest};
use osiris_types::events::ServerEvent;
use osiris_types::models::NotificationKind;

use crate::error::ApiError;
use crate::middleware::{JsonBody, Viewer};
use crate::notify::notify;
use crate::permissions::{Actor, can_delete_content, standing};
use crate::{AppState, blocking, convert};

const MAX_COMMENT: usize = 5_000;

fn validate_comment(content: &str) -> Result<(), ApiError> {
    let len = content.trim().chars().count();
    if len == 0 || content.chars().count() > MAX_COMMENT {
        return Err(ApiError::bad_request(format!("Comment must be 1-{} characters", MAX_COMMENT)));
    }
    Ok(())
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_comment(&req.content)?;
    if let Some(word) = state.word_filter.check(&req.content) {
        return Err(ApiError::bad_request(format!("Comment contains a banned word: {}", word)));
    }

    let comment_id = Uuid::new_v4().to_string();
    let pid = post_id.to_string();
    let author_id = claims.sub.to_string();
    let parent_id = req.parent_id.map(|p| p.to_string());
    let content = req.content;

    let (row, post_author, community_id, parent_author) = blocking(&state, move |db| {
        let Some(post) = db.get_post(&pid, None)? else {
            return Err(ApiError::not_found("Post"));
        };
        if let Some(community_id) = &post.community_id {
            if db.is_banned(community_id, &author_id)? {
                return Err(ApiError::forbidden("You are banned from this community"));
            }
        }

        let parent_author = match &parent_id {
            Some(parent_id) => match db.get_comment(parent_id, None)? {
                Some(parent) if parent.post_id == pid => Some(parent.author_id),
                _ => return Err(ApiError::bad_request("Parent comment is not on this post")),
            },
            None => None,
        };

        db.insert_comment(&comment_id, &pid, &author_id, parent_id.as_deref(), &content)?;
        let row = db
            .get_comment(&comment_id, Some(&author_id))?
            .ok_or_else(|| anyhow::anyhow!("comment {} vanished after insert", comment_id))?;
        Ok((row, post.author_id, post.community_id, parent_author))
    })
    .await?;

    let comment = convert::comment(row);
    info!("{} commented on post {}", claims.username, post_id);

    let post_author = convert::id(&post_author);
    let parent_author = convert::opt_id(parent_author.as_deref());
    if parent_author != Some(post_author) {
        notify(
            &state,
            post_author,
            NotificationKind::NewComment,
            Some(claims.sub),
            Some(post_id),
            format!("{} commented on your post", claims.username),
        )
        .await;
    }
    if let Some(parent_author) = parent_author {
        notify(
            &state,
            parent_author,
            NotificationKind::NewReply,
            Some(claims.sub),
            Some(comment.id),
            format!("{} replied to your comment", claims.username),
        )
        .await;
    }

    state.dispatcher.broadcast(ServerEvent::NewComment {
        comment: comment.clone(),
        community_id: convert::opt_id(community_id.as_deref()),
    });

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let pid = post_id.to_string();
    let viewer = viewer.id();
    let rows = blocking(&state, move |db| {
        if db.get_post(&pid, None)?.is_none() {
            return Ok(None);
        }
        Ok(Some(db.list_comments(&pid, viewer.as_deref())?))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Post"))?;

    Ok(Json(rows.into_iter().map(convert::comment).collect::<Vec<_>>()))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_comment(&req.content)?;
    if let Some(word) = state.word_filter.check(&req.content) {
        return Err(ApiError::bad_request(format!("Comment contains a banned word: {}", word)));
    }

    let cid = comment_id.to_string();
    let user_id = claims.sub.to_string();
    let content = req.content;
    let row = blocking(&state, move |db| {
        let Some(comment) = db.get_comment(&cid, None)? else {
            return Err(ApiError::not_found("Comment"));
        };
        if comment.author_id != user_id {
            return Err(ApiError::forbidden("Only the author can edit a comment"));
        }
        db.update_comment(&cid, &content)?;
        db.get_comment(&cid, Some(&user_id))?.ok_or_else(|| ApiError::not_found("Comment"))
    })
    .await?;

    Ok(Json(convert::comment(row)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let cid = comment_id.to_string();
    let user_id = claims.sub.to_string();
    let (post_id, community_id, removed) = blocking(&state, move |db| {
        let Some(comment) = db.get_comment(&cid, None)? else {
            return Err(ApiError::not_found("Comment"));
        };
        let community_id = db.get_post(&comment.post_id, None)?.and_then(|p| p.community_id);
        let (is_admin, role) = standing(db, &user_id, community_id.as_deref())?;
        let actor = Actor {
            user_id: &user_id,
            is_admin,
            role,
        };
        if !can_delete_content(&actor, &comment.author_id) {
            return Err(ApiError::forbidden("You cannot delete this comment"));
        }
        let removed = db.delete_comment(&cid)?;
        Ok((comment.post_id, community_id, removed))
    })
    .await?;

    info!("{} deleted comment {} ({} with replies)", claims.username, comment_id, removed);
    state.dispatcher.broadcast(ServerEvent::CommentDeleted {
        comment_id,
        post_id: convert::id(&post_id),
        community_id: convert::opt_id(community_id.as_deref()),
    });

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_length() {
        assert!(validate_comment("ok").is_ok());
        assert!(validate_comment("   ").is_err());
        assert!(validate_comment(&"x".repeat(MAX_COMMENT + 1)).is_err());
    }
}
