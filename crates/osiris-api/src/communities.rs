use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use osiris_db::Database;
use osiris_db::models::{CommunityRow, PostFilter};
use osiris_types::api::{
    BanRequest, Claims, CreateCommunityRequest, SetRoleRequest, UpdateCommunityRequest,
};
use osiris_types::events::ServerEvent;
use osiris_types::models::{CommunityRole, NotificationKind, PostCategory};

use crate::error::ApiError;
use crate::middleware::{JsonBody, Viewer};
use crate::notify::notify;
use crate::permissions::{Actor, can_ban, can_moderate_community, standing};
use crate::users::PageQuery;
use crate::{AppState, blocking, convert, page_limit};

const MAX_DESCRIPTION: usize = 1_000;

/// Lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

fn validate_description(description: &str) -> Result<(), ApiError> {
    if description.chars().count() > MAX_DESCRIPTION {
        return Err(ApiError::bad_request(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION
        )));
    }
    Ok(())
}

/// Deduplicate while keeping the caller's order. An empty list is rejected.
fn normalize_categories(categories: &[PostCategory]) -> Result<Vec<PostCategory>, ApiError> {
    let mut out: Vec<PostCategory> = Vec::with_capacity(categories.len());
    for category in categories {
        if !out.contains(category) {
            out.push(*category);
        }
    }
    if out.is_empty() {
        return Err(ApiError::bad_request("A community must allow at least one category"));
    }
    Ok(out)
}

fn find_community(db: &Database, slug: &str) -> Result<CommunityRow, ApiError> {
    db.get_community_by_slug(slug)?
        .ok_or_else(|| ApiError::not_found("Community"))
}

/// Load the community and check that the caller may moderate it.
/// Returns the caller's admin flag and community role alongside.
fn moderated_community(
    db: &Database,
    slug: &str,
    user_id: &str,
) -> Result<(CommunityRow, bool, Option<CommunityRole>), ApiError> {
    let community = find_community(db, slug)?;
    let (is_admin, role) = standing(db, user_id, Some(&community.id))?;
    let actor = Actor {
        user_id,
        is_admin,
        role,
    };
    if !can_moderate_community(&actor) {
        return Err(ApiError::forbidden("Only moderators can do that"));
    }
    Ok((community, is_admin, role))
}

pub async fn create_community(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<CreateCommunityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim().to_string();
    let len = name.chars().count();
    if !(3..=50).contains(&len) {
        return Err(ApiError::bad_request("Community name must be 3-50 characters"));
    }
    let slug = slugify(&name);
    if slug.is_empty() {
        return Err(ApiError::bad_request("Community name needs letters or digits"));
    }
    let description = req.description.unwrap_or_default();
    validate_description(&description)?;
    let allowed = match &req.allowed_categories {
        Some(categories) => normalize_categories(categories)?,
        None => PostCategory::ALL.to_vec(),
    };
    if let Some(word) = state.word_filter.check_all(&[&name, &description]) {
        return Err(ApiError::bad_request(format!("Community contains a banned word: {}", word)));
    }

    let community_id = Uuid::new_v4().to_string();
    let owner_id = claims.sub.to_string();
    let row = blocking(&state, move |db| {
        let created = db.create_community(
            &community_id,
            &slug,
            &name,
            &description,
            &owner_id,
            &convert::join_categories(&allowed),
        )?;
        if !created {
            return Err(ApiError::conflict(format!("A community named '{}' already exists", slug)));
        }
        find_community(db, &slug)
    })
    .await?;

    info!("{} created community {}", claims.username, row.slug);
    Ok((StatusCode::CREATED, Json(convert::community(row)?)))
}

pub async fn list_communities(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, |db| Ok(db.list_communities()?)).await?;
    let communities = rows.into_iter().map(convert::community).collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(communities))
}

pub async fn get_community(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = blocking(&state, move |db| find_community(db, &slug)).await?;
    Ok(Json(convert::community(row)?))
}

pub async fn update_community(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<UpdateCommunityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(description) = &req.description {
        validate_description(description)?;
        if let Some(word) = state.word_filter.check(description) {
            return Err(ApiError::bad_request(format!("Community contains a banned word: {}", word)));
        }
    }
    let allowed = req
        .allowed_categories
        .as_deref()
        .map(normalize_categories)
        .transpose()?
        .map(|c| convert::join_categories(&c));

    let user_id = claims.sub.to_string();
    let description = req.description;
    let row = blocking(&state, move |db| {
        let (community, _, _) = moderated_community(db, &slug, &user_id)?;
        db.update_community(&community.id, description.as_deref(), allowed.as_deref())?;
        find_community(db, &slug)
    })
    .await?;

    Ok(Json(convert::community(row)?))
}

pub async fn delete_community(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let slug_for_log = slug.clone();
    blocking(&state, move |db| {
        let community = find_community(db, &slug)?;
        let (is_admin, _) = standing(db, &user_id, None)?;
        if community.owner_id != user_id && !is_admin {
            return Err(ApiError::forbidden("Only the owner can delete a community"));
        }
        db.delete_community(&community.id)?;
        Ok(())
    })
    .await?;

    info!("{} deleted community {}", claims.username, slug_for_log);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn join(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let member = blocking(&state, move |db| {
        let community = find_community(db, &slug)?;
        if db.is_banned(&community.id, &user_id)? {
            return Err(ApiError::forbidden("You are banned from this community"));
        }
        if !db.add_member(&community.id, &user_id, CommunityRole::Member.as_str())? {
            return Err(ApiError::conflict("Already a member"));
        }
        db.list_members(&community.id)?
            .into_iter()
            .find(|m| m.user_id == user_id)
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("membership for {} missing after join", user_id)))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(convert::member(member)?)))
}

pub async fn leave(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    blocking(&state, move |db| {
        let community = find_community(db, &slug)?;
        if community.owner_id == user_id {
            return Err(ApiError::bad_request("The owner cannot leave their own community"));
        }
        if !db.remove_member(&community.id, &user_id)? {
            return Err(ApiError::not_found("Membership"));
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, move |db| {
        let community = find_community(db, &slug)?;
        Ok(db.list_members(&community.id)?)
    })
    .await?;

    let members = rows.into_iter().map(convert::member).collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(members))
}

pub async fn set_role(
    State(state): State<AppState>,
    Path((slug, target)): Path<(String, Uuid)>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<SetRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.role == CommunityRole::Owner {
        return Err(ApiError::bad_request("Role must be member or moderator"));
    }

    let user_id = claims.sub.to_string();
    let target_id = target.to_string();
    let role = req.role;
    let member = blocking(&state, move |db| {
        let community = find_community(db, &slug)?;
        if community.owner_id != user_id {
            return Err(ApiError::forbidden("Only the owner can change roles"));
        }
        if community.owner_id == target_id {
            return Err(ApiError::bad_request("The owner's role cannot be changed"));
        }
        if !db.set_member_role(&community.id, &target_id, role.as_str())? {
            return Err(ApiError::not_found("Member"));
        }
        db.list_members(&community.id)?
            .into_iter()
            .find(|m| m.user_id == target_id)
            .ok_or_else(|| ApiError::not_found("Member"))
    })
    .await?;

    info!("{} set {} to {} in a community", claims.username, target, role);
    Ok(Json(convert::member(member)?))
}

pub async fn ban(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<BanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.user_id == claims.sub {
        return Err(ApiError::bad_request("You cannot ban yourself"));
    }
    let reason = req.reason.map(|r| r.trim().to_string()).unwrap_or_default();
    if reason.chars().count() > MAX_DESCRIPTION {
        return Err(ApiError::bad_request(format!(
            "Reason must be at most {} characters",
            MAX_DESCRIPTION
        )));
    }

    let user_id = claims.sub.to_string();
    let target_id = req.user_id.to_string();
    let (community, ban) = blocking(&state, move |db| {
        let (community, is_admin, role) = moderated_community(db, &slug, &user_id)?;
        if db.get_user_summary(&target_id)?.is_none() {
            return Err(ApiError::not_found("User"));
        }
        if db.is_banned(&community.id, &target_id)? {
            return Err(ApiError::conflict("User is already banned"));
        }
        let target_role = db
            .get_membership(&community.id, &target_id)?
            .as_deref()
            .map(convert::parse::<CommunityRole>)
            .transpose()?;
        // Site admins act with owner authority.
        let actor_role = if is_admin { Some(CommunityRole::Owner) } else { role };
        if !can_ban(actor_role, target_role) {
            return Err(ApiError::forbidden("You cannot ban this user"));
        }
        db.ban_member(&community.id, &target_id, &user_id, &reason)?;
        let ban = db
            .list_bans(&community.id)?
            .into_iter()
            .find(|b| b.user_id == target_id)
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("ban for {} missing after insert", target_id)))?;
        Ok((community, ban))
    })
    .await?;

    info!("{} banned {} from {}", claims.username, req.user_id, community.slug);
    let community_id = convert::id(&community.id);
    state
        .dispatcher
        .send_to_user(
            req.user_id,
            ServerEvent::Banned {
                community_id,
                community_slug: community.slug.clone(),
                reason: ban.reason.clone(),
            },
        )
        .await;
    notify(
        &state,
        req.user_id,
        NotificationKind::Banned,
        Some(claims.sub),
        Some(community_id),
        format!("You were banned from {}", community.name),
    )
    .await;

    Ok((StatusCode::CREATED, Json(convert::ban(ban))))
}

pub async fn unban(
    State(state): State<AppState>,
    Path((slug, target)): Path<(String, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let target_id = target.to_string();
    blocking(&state, move |db| {
        let (community, _, _) = moderated_community(db, &slug, &user_id)?;
        if !db.unban_member(&community.id, &target_id)? {
            return Err(ApiError::not_found("Ban"));
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_bans(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let rows = blocking(&state, move |db| {
        let (community, _, _) = moderated_community(db, &slug, &user_id)?;
        Ok(db.list_bans(&community.id)?)
    })
    .await?;

    Ok(Json(rows.into_iter().map(convert::ban).collect::<Vec<_>>()))
}

pub async fn list_community_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let limit = page_limit(query.limit, 20, 100);
    let before = convert::cursor(query.before.as_deref())?;
    let viewer = viewer.id();
    let rows = blocking(&state, move |db| {
        let community = find_community(db, &slug)?;
        let filter = PostFilter {
            community_id: Some(&community.id),
            ..Default::default()
        };
        Ok(db.list_posts(&filter, viewer.as_deref(), limit, before.as_deref())?)
    })
    .await?;

    Ok(Json(convert::posts(rows)?))
}
