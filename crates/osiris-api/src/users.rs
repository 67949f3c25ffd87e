use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;

use osiris_db::models::PostFilter;
use osiris_types::api::{Claims, UpdateProfileRequest};

use crate::error::ApiError;
use crate::middleware::{JsonBody, Viewer};
use crate::{AppState, blocking, convert, page_limit};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub before: Option<String>,
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let user = blocking(&state, move |db| Ok(db.get_user(&user_id)?))
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(convert::user_profile(user)))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = req.display_name.as_deref().map(str::trim).map(str::to_string);
    if let Some(name) = &display_name {
        let len = name.chars().count();
        if !(1..=50).contains(&len) {
            return Err(ApiError::bad_request("Display name must be 1-50 characters"));
        }
    }
    if let Some(bio) = &req.bio {
        if bio.chars().count() > 500 {
            return Err(ApiError::bad_request("Bio must be at most 500 characters"));
        }
    }
    let fields: Vec<&str> = display_name.iter().chain(req.bio.iter()).map(String::as_str).collect();
    if let Some(word) = state.word_filter.check_all(&fields) {
        return Err(ApiError::bad_request(format!("Profile contains a banned word: {}", word)));
    }

    let user_id = claims.sub.to_string();
    let avatar = req.avatar_upload_id.map(|id| id.to_string());
    let bio = req.bio;
    let user = blocking(&state, move |db| {
        if let Some(avatar) = &avatar {
            let Some(upload) = db.get_upload(avatar)? else {
                return Err(ApiError::not_found("Upload"));
            };
            if upload.owner_id != user_id {
                return Err(ApiError::forbidden("Avatar must be one of your own uploads"));
            }
            if upload.kind != "image" {
                return Err(ApiError::bad_request("Avatar must be an image"));
            }
        }
        db.update_profile(&user_id, display_name.as_deref(), bio.as_deref(), avatar.as_deref())?;
        db.get_user(&user_id)?.ok_or_else(|| ApiError::not_found("User"))
    })
    .await?;

    Ok(Json(convert::user_profile(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let (user, (followers, following)) = blocking(&state, move |db| {
        let Some(user) = db.get_user(&uid)? else {
            return Ok(None);
        };
        let counts = db.follow_counts(&uid)?;
        Ok(Some((user, counts)))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(convert::public_profile(user, followers, following)))
}

pub async fn list_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page_limit(query.limit, 20, 100);
    let before = convert::cursor(query.before.as_deref())?;
    let uid = user_id.to_string();
    let viewer = viewer.id();

    let rows = blocking(&state, move |db| {
        if db.get_user_summary(&uid)?.is_none() {
            return Ok(None);
        }
        let filter = PostFilter {
            author_id: Some(&uid),
            ..Default::default()
        };
        Ok(Some(db.list_posts(&filter, viewer.as_deref(), limit, before.as_deref())?))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(convert::posts(rows)?))
}
