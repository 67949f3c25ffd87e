use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use osiris_types::api::{Claims, MarkReadResponse, NotificationList};

use crate::error::ApiError;
use crate::{AppState, blocking, convert, page_limit};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u32>,
    pub before: Option<String>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page_limit(query.limit, 30, 100);
    let before = convert::cursor(query.before.as_deref())?;

    let user_id = claims.sub.to_string();
    let unread_only = query.unread_only;
    let (rows, unread) = blocking(&state, move |db| {
        let rows = db.list_notifications(&user_id, unread_only, limit, before.as_deref())?;
        Ok((rows, db.unread_notification_count(&user_id)?))
    })
    .await?;

    let notifications = rows
        .into_iter()
        .map(convert::notification)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(NotificationList {
        notifications,
        unread: unread.max(0) as u64,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let nid = notification_id.to_string();
    let user_id = claims.sub.to_string();
    let found = blocking(&state, move |db| Ok(db.mark_notification_read(&nid, &user_id)?)).await?;
    if !found {
        return Err(ApiError::not_found("Notification"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let marked = blocking(&state, move |db| Ok(db.mark_all_notifications_read(&user_id)?)).await?;
    Ok(Json(MarkReadResponse { marked: marked as u64 }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let nid = notification_id.to_string();
    let user_id = claims.sub.to_string();
    let removed = blocking(&state, move |db| Ok(db.delete_notification(&nid, &user_id)?)).await?;
    if !removed {
        return Err(ApiError::not_found("Notification"));
    }
    Ok(StatusCode::NO_CONTENT)
}
