use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::debug;
use uuid::Uuid;

use osiris_types::api::{Claims, MarkReadResponse, SendMessageRequest};
use osiris_types::events::ServerEvent;

use crate::error::ApiError;
use crate::middleware::JsonBody;
use crate::users::PageQuery;
use crate::{AppState, blocking, convert, page_limit};

const MAX_MESSAGE: usize = 2_000;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.recipient_id == claims.sub {
        return Err(ApiError::bad_request("You cannot message yourself"));
    }
    let content = req.content.trim().to_string();
    let len = content.chars().count();
    if !(1..=MAX_MESSAGE).contains(&len) {
        return Err(ApiError::bad_request(format!("Message must be 1-{} characters", MAX_MESSAGE)));
    }
    if let Some(word) = state.word_filter.check(&content) {
        return Err(ApiError::bad_request(format!("Message contains a banned word: {}", word)));
    }

    let message_id = Uuid::new_v4().to_string();
    let sender_id = claims.sub.to_string();
    let recipient_id = req.recipient_id.to_string();
    let row = blocking(&state, move |db| {
        if db.get_user_summary(&recipient_id)?.is_none() {
            return Err(ApiError::not_found("User"));
        }
        Ok(db.insert_message(&message_id, &sender_id, &recipient_id, &content)?)
    })
    .await?;

    let message = convert::message(row);
    let delivered = state
        .dispatcher
        .send_to_user(
            req.recipient_id,
            ServerEvent::NewMessage {
                message: message.clone(),
                sender_username: claims.username.clone(),
            },
        )
        .await;
    debug!("Message {} pushed to {} connections", message.id, delivered);

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let rows = blocking(&state, move |db| Ok(db.list_conversations(&user_id)?)).await?;
    Ok(Json(rows.into_iter().map(convert::conversation).collect::<Vec<_>>()))
}

/// Messages exchanged with one partner, newest first.
pub async fn get_thread(
    State(state): State<AppState>,
    Path(partner): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page_limit(query.limit, 50, 100);
    let before = convert::cursor(query.before.as_deref())?;

    let user_id = claims.sub.to_string();
    let partner_id = partner.to_string();
    let rows = blocking(&state, move |db| {
        Ok(db.list_thread(&user_id, &partner_id, limit, before.as_deref())?)
    })
    .await?;

    Ok(Json(rows.into_iter().map(convert::message).collect::<Vec<_>>()))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(partner): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let partner_id = partner.to_string();
    let marked = blocking(&state, move |db| Ok(db.mark_thread_read(&user_id, &partner_id)?)).await?;
    Ok(Json(MarkReadResponse { marked: marked as u64 }))
}
