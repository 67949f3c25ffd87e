use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::debug;
use uuid::Uuid;

use osiris_types::api::{Claims, CommentLikeResponse, ReactRequest, ReactionResponse};
use osiris_types::events::ServerEvent;
use osiris_types::models::{NotificationKind, ReactionKind};

use crate::error::ApiError;
use crate::middleware::JsonBody;
use crate::notify::notify;
use crate::{AppState, blocking, convert};

pub async fn react_to_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<ReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pid = post_id.to_string();
    let user_id = claims.sub.to_string();
    let kind = req.kind;
    let outcome = blocking(&state, move |db| Ok(db.toggle_post_reaction(&pid, &user_id, kind.as_str())?))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    let reaction: Option<ReactionKind> = outcome.current.as_deref().map(convert::parse).transpose()?;
    let likes = outcome.likes.max(0) as u64;
    let dislikes = outcome.dislikes.max(0) as u64;
    debug!(
        "{} reaction on {}: {:?} -> {:?}",
        claims.username, post_id, outcome.previous, outcome.current
    );

    state.dispatcher.broadcast(ServerEvent::ReactionUpdate {
        post_id,
        community_id: convert::opt_id(outcome.community_id.as_deref()),
        likes,
        dislikes,
    });

    if outcome.previous.is_none() && reaction == Some(ReactionKind::Like) {
        notify(
            &state,
            convert::id(&outcome.author_id),
            NotificationKind::NewReaction,
            Some(claims.sub),
            Some(post_id),
            format!("{} liked your post", claims.username),
        )
        .await;
    }

    Ok(Json(ReactionResponse {
        reaction,
        likes,
        dislikes,
    }))
}

pub async fn like_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let cid = comment_id.to_string();
    let user_id = claims.sub.to_string();
    let outcome = blocking(&state, move |db| Ok(db.toggle_comment_like(&cid, &user_id)?))
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;

    Ok(Json(CommentLikeResponse {
        liked: outcome.liked,
        likes: outcome.likes.max(0) as u64,
    }))
}
