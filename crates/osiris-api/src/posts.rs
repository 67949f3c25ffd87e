use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use osiris_db::models::{NewPost, PostFilter};
use osiris_types::api::{Claims, CreatePostRequest, UpdatePostRequest};
use osiris_types::events::ServerEvent;
use osiris_types::models::PostCategory;

use crate::error::ApiError;
use crate::middleware::{JsonBody, Viewer};
use crate::permissions::{Actor, can_delete_content, standing};
use crate::users::PageQuery;
use crate::{AppState, blocking, convert, page_limit};

const MAX_TITLE: usize = 200;
const MAX_CONTENT: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    pub category: Option<String>,
    pub community: Option<Uuid>,
    pub limit: Option<u32>,
    pub before: Option<String>,
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    let len = title.chars().count();
    if !(1..=MAX_TITLE).contains(&len) {
        return Err(ApiError::bad_request(format!("Title must be 1-{} characters", MAX_TITLE)));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ApiError> {
    if content.chars().count() > MAX_CONTENT {
        return Err(ApiError::bad_request(format!(
            "Content must be at most {} characters",
            MAX_CONTENT
        )));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<(), ApiError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::bad_request("URL must start with http:// or https://"));
    }
    Ok(())
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim().to_string();
    let content = req.content.unwrap_or_default();
    validate_title(&title)?;
    validate_content(&content)?;

    if content.trim().is_empty() && req.upload_id.is_none() {
        return Err(ApiError::bad_request("A post needs text content or a file"));
    }
    if req.category == PostCategory::Media && req.upload_id.is_none() {
        return Err(ApiError::bad_request("Media posts require an uploaded file"));
    }
    let url = req.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
    if let Some(url) = &url {
        validate_url(url)?;
    }
    if let Some(word) = state.word_filter.check_all(&[&title, &content]) {
        return Err(ApiError::bad_request(format!("Post contains a banned word: {}", word)));
    }

    let post_id = Uuid::new_v4().to_string();
    let author_id = claims.sub.to_string();
    let community_id = req.community_id.map(|c| c.to_string());
    let upload_id = req.upload_id.map(|u| u.to_string());
    let category = req.category;

    let row = blocking(&state, move |db| {
        if let Some(upload_id) = &upload_id {
            let Some(upload) = db.get_upload(upload_id)? else {
                return Err(ApiError::not_found("Upload"));
            };
            if upload.owner_id != author_id {
                return Err(ApiError::forbidden("You can only attach your own uploads"));
            }
        }

        if let Some(community_id) = &community_id {
            let Some(community) = db.get_community(community_id)? else {
                return Err(ApiError::not_found("Community"));
            };
            if db.is_banned(community_id, &author_id)? {
                return Err(ApiError::forbidden("You are banned from this community"));
            }
            if db.get_membership(community_id, &author_id)?.is_none() {
                return Err(ApiError::forbidden("Join the community before posting"));
            }
            let allowed = convert::split_categories(&community.allowed_categories)?;
            if !allowed.contains(&category) {
                return Err(ApiError::bad_request(format!(
                    "{} posts are not allowed in this community",
                    category
                )));
            }
        }

        db.insert_post(&NewPost {
            id: &post_id,
            author_id: &author_id,
            community_id: community_id.as_deref(),
            category: category.as_str(),
            title: &title,
            content: &content,
            url: url.as_deref(),
            upload_id: upload_id.as_deref(),
        })?;
        let row = db
            .get_post(&post_id, Some(&author_id))?
            .ok_or_else(|| anyhow::anyhow!("post {} vanished after insert", post_id))?;
        Ok(row)
    })
    .await?;

    let post = convert::post(row)?;
    info!("{} created post {} ({})", claims.username, post.id, post.category);
    state.dispatcher.broadcast(ServerEvent::NewPost { post: post.clone() });

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let category = query
        .category
        .as_deref()
        .map(convert::parse::<PostCategory>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let limit = page_limit(query.limit, 20, 100);
    let before = convert::cursor(query.before.as_deref())?;
    let community = query.community.map(|c| c.to_string());
    let viewer = viewer.id();

    let rows = blocking(&state, move |db| {
        let filter = PostFilter {
            category: category.as_ref().map(PostCategory::as_str),
            community_id: community.as_deref(),
            ..Default::default()
        };
        Ok(db.list_posts(&filter, viewer.as_deref(), limit, before.as_deref())?)
    })
    .await?;

    Ok(Json(convert::posts(rows)?))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let pid = post_id.to_string();
    let viewer = viewer.id();
    let row = blocking(&state, move |db| Ok(db.get_post(&pid, viewer.as_deref())?))
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(Json(convert::post(row)?))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.map(|t| t.trim().to_string());
    if let Some(title) = &title {
        validate_title(title)?;
    }
    if let Some(content) = &req.content {
        validate_content(content)?;
    }
    let fields: Vec<&str> = title.iter().chain(req.content.iter()).map(String::as_str).collect();
    if let Some(word) = state.word_filter.check_all(&fields) {
        return Err(ApiError::bad_request(format!("Post contains a banned word: {}", word)));
    }

    let pid = post_id.to_string();
    let user_id = claims.sub.to_string();
    let content = req.content;
    let row = blocking(&state, move |db| {
        let Some(post) = db.get_post(&pid, Some(&user_id))? else {
            return Err(ApiError::not_found("Post"));
        };
        if post.author_id != user_id {
            return Err(ApiError::forbidden("Only the author can edit a post"));
        }
        if let Some(content) = &content {
            if content.trim().is_empty() && post.upload_id.is_none() {
                return Err(ApiError::bad_request("A post needs text content or a file"));
            }
        }
        db.update_post(&pid, title.as_deref(), content.as_deref())?;
        db.get_post(&pid, Some(&user_id))?.ok_or_else(|| ApiError::not_found("Post"))
    })
    .await?;

    Ok(Json(convert::post(row)?))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let pid = post_id.to_string();
    let user_id = claims.sub.to_string();
    let community_id = blocking(&state, move |db| {
        let Some(post) = db.get_post(&pid, None)? else {
            return Err(ApiError::not_found("Post"));
        };
        let (is_admin, role) = standing(db, &user_id, post.community_id.as_deref())?;
        let actor = Actor {
            user_id: &user_id,
            is_admin,
            role,
        };
        if !can_delete_content(&actor, &post.author_id) {
            return Err(ApiError::forbidden("You cannot delete this post"));
        }
        db.delete_post(&pid)?;
        Ok(post.community_id)
    })
    .await?;

    info!("{} deleted post {}", claims.username, post_id);
    state.dispatcher.broadcast(ServerEvent::PostDeleted {
        post_id,
        community_id: convert::opt_id(community_id.as_deref()),
    });

    Ok(StatusCode::NO_CONTENT)
}

pub async fn feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page_limit(query.limit, 20, 100);
    let before = convert::cursor(query.before.as_deref())?;
    let user_id = claims.sub.to_string();

    let rows = blocking(&state, move |db| {
        let filter = PostFilter {
            followed_by: Some(&user_id),
            ..Default::default()
        };
        Ok(db.list_posts(&filter, Some(&user_id), limit, before.as_deref())?)
    })
    .await?;

    Ok(Json(convert::posts(rows)?))
}
