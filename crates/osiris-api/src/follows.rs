use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use osiris_types::api::Claims;
use osiris_types::events::ServerEvent;
use osiris_types::models::NotificationKind;

use crate::error::ApiError;
use crate::notify::notify;
use crate::{AppState, blocking, convert};

pub async fn follow(
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if target == claims.sub {
        return Err(ApiError::bad_request("You cannot follow yourself"));
    }

    let follower_id = claims.sub.to_string();
    let followee_id = target.to_string();
    let (followee, follower) = blocking(&state, move |db| {
        let Some(followee) = db.get_user_summary(&followee_id)? else {
            return Err(ApiError::not_found("User"));
        };
        if !db.follow(&follower_id, &followee_id)? {
            return Err(ApiError::conflict("Already following this user"));
        }
        let follower = db
            .get_user_summary(&follower_id)?
            .ok_or_else(|| anyhow::anyhow!("follower {} has no account", follower_id))?;
        Ok((followee, follower))
    })
    .await?;

    let follower = convert::user_summary(follower);
    state
        .dispatcher
        .send_to_user(target, ServerEvent::NewFollower { follower })
        .await;
    notify(
        &state,
        target,
        NotificationKind::NewFollower,
        Some(claims.sub),
        Some(claims.sub),
        format!("{} started following you", claims.username),
    )
    .await;

    Ok((StatusCode::CREATED, Json(convert::user_summary(followee))))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let follower_id = claims.sub.to_string();
    let followee_id = target.to_string();
    let removed = blocking(&state, move |db| Ok(db.unfollow(&follower_id, &followee_id)?)).await?;
    if !removed {
        return Err(ApiError::not_found("Follow"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_followers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let rows = blocking(&state, move |db| {
        if db.get_user_summary(&uid)?.is_none() {
            return Ok(None);
        }
        Ok(Some(db.list_followers(&uid)?))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(rows.into_iter().map(convert::user_summary).collect::<Vec<_>>()))
}

pub async fn list_following(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let rows = blocking(&state, move |db| {
        if db.get_user_summary(&uid)?.is_none() {
            return Ok(None);
        }
        Ok(Some(db.list_following(&uid)?))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(rows.into_iter().map(convert::user_summary).collect::<Vec<_>>()))
}
