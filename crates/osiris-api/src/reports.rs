use std::collections::BTreeSet;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use bytes::Bytes;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use osiris_db::Database;
use osiris_db::models::ReportRow;
use osiris_types::api::{Claims, CreateReportRequest, RejectReportRequest, ResolveReportRequest};
use osiris_types::events::ServerEvent;
use osiris_types::models::{NotificationKind, PostCategory, ReportStatus, ReportTarget};

use crate::error::ApiError;
use crate::middleware::{JsonBody, optional_json};
use crate::notify::notify;
use crate::permissions::{Actor, can_moderate_community, standing};
use crate::{AppState, blocking, convert};

const MAX_REASON: usize = 1_000;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub status: Option<String>,
}

/// What a deleted report target was, for the follow-up gateway event.
enum Removed {
    Post { post_id: Uuid, community_id: Option<Uuid> },
    Comment { comment_id: Uuid, post_id: Uuid, community_id: Option<Uuid> },
}

/// Load a report the caller may act on, refusing anything no longer pending.
fn actionable_report(db: &Database, id: &str, user_id: &str) -> Result<ReportRow, ApiError> {
    let report = db.get_report(id)?.ok_or_else(|| ApiError::not_found("Report"))?;
    let (is_admin, role) = standing(db, user_id, report.community_id.as_deref())?;
    let actor = Actor {
        user_id,
        is_admin,
        role,
    };
    if !can_moderate_community(&actor) {
        return Err(ApiError::forbidden("Only moderators can handle this report"));
    }
    if report.status != ReportStatus::Pending.as_str() {
        return Err(ApiError::conflict(format!("Report is already {}", report.status)));
    }
    Ok(report)
}

pub async fn create_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<CreateReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = req.reason.trim().to_string();
    let len = reason.chars().count();
    if !(1..=MAX_REASON).contains(&len) {
        return Err(ApiError::bad_request(format!("Reason must be 1-{} characters", MAX_REASON)));
    }

    let report_id = Uuid::new_v4().to_string();
    let reporter_id = claims.sub.to_string();
    let target_id = req.target_id.to_string();
    let target_type = req.target_type;
    let row = blocking(&state, move |db| {
        let (author_id, community_id) = match target_type {
            ReportTarget::Post | ReportTarget::Discussion => {
                let post = db.get_post(&target_id, None)?.ok_or_else(|| ApiError::not_found("Post"))?;
                if target_type == ReportTarget::Discussion && post.category != PostCategory::Discussion.as_str() {
                    return Err(ApiError::bad_request("Discussion reports must target a discussion post"));
                }
                (post.author_id, post.community_id)
            }
            ReportTarget::Comment => {
                let comment = db
                    .get_comment(&target_id, None)?
                    .ok_or_else(|| ApiError::not_found("Comment"))?;
                let community_id = db.get_post(&comment.post_id, None)?.and_then(|p| p.community_id);
                (comment.author_id, community_id)
            }
        };
        if author_id == reporter_id {
            return Err(ApiError::bad_request("You cannot report your own content"));
        }
        if db.has_pending_report(&reporter_id, &target_id)? {
            return Err(ApiError::conflict("You already reported this"));
        }

        db.insert_report(
            &report_id,
            &reporter_id,
            target_type.as_str(),
            &target_id,
            community_id.as_deref(),
            &reason,
        )?;
        db.get_report(&report_id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("report {} vanished after insert", report_id)))
    })
    .await?;

    info!("{} reported {} {}", claims.username, row.target_type, row.target_id);
    Ok((StatusCode::CREATED, Json(convert::report(row)?)))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(convert::parse::<ReportStatus>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let user_id = claims.sub.to_string();
    let rows = blocking(&state, move |db| {
        let (is_admin, _) = standing(db, &user_id, None)?;
        let status = status.as_ref().map(ReportStatus::as_str);
        if is_admin {
            return Ok(db.list_reports(status, None)?);
        }
        let moderated = db.moderated_community_ids(&user_id)?;
        if moderated.is_empty() {
            return Err(ApiError::forbidden("Only moderators can view reports"));
        }
        Ok(db.list_reports(status, Some(&moderated))?)
    })
    .await?;

    let reports = rows.into_iter().map(convert::report).collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(reports))
}

pub async fn resolve_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: ResolveReportRequest = optional_json(&body)?;
    let rid = report_id.to_string();
    let user_id = claims.sub.to_string();

    let (changed, removed) = blocking(&state, move |db| {
        let report = actionable_report(db, &rid, &user_id)?;

        let removed = if req.delete_target {
            match convert::parse::<ReportTarget>(&report.target_type)? {
                ReportTarget::Comment => db.get_comment(&report.target_id, None)?.map(|c| {
                    let community_id = report.community_id.as_deref();
                    Removed::Comment {
                        comment_id: convert::id(&c.id),
                        post_id: convert::id(&c.post_id),
                        community_id: convert::opt_id(community_id),
                    }
                }),
                ReportTarget::Post | ReportTarget::Discussion => db.get_post(&report.target_id, None)?.map(|p| {
                    Removed::Post {
                        post_id: convert::id(&p.id),
                        community_id: convert::opt_id(p.community_id.as_deref()),
                    }
                }),
            }
        } else {
            None
        };

        let changed = db.resolve_report(&rid, &user_id, req.note.as_deref(), req.delete_target)?;
        Ok((changed, removed))
    })
    .await?;

    info!(
        "{} resolved report {} ({} reports closed)",
        claims.username,
        report_id,
        changed.len()
    );

    match removed {
        Some(Removed::Post { post_id, community_id }) => {
            state.dispatcher.broadcast(ServerEvent::PostDeleted { post_id, community_id });
        }
        Some(Removed::Comment {
            comment_id,
            post_id,
            community_id,
        }) => {
            state.dispatcher.broadcast(ServerEvent::CommentDeleted {
                comment_id,
                post_id,
                community_id,
            });
        }
        None => {}
    }

    let reporters: BTreeSet<Uuid> = changed.iter().map(|r| convert::id(&r.reporter_id)).collect();
    for reporter in reporters {
        notify(
            &state,
            reporter,
            NotificationKind::ReportResolved,
            Some(claims.sub),
            changed.first().map(|r| convert::id(&r.target_id)),
            "A report you filed was resolved".to_string(),
        )
        .await;
    }

    let resolved = changed
        .into_iter()
        .find(|r| r.id == report_id.to_string())
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("report {} missing from resolution", report_id)))?;
    Ok(Json(convert::report(resolved)?))
}

pub async fn reject_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: RejectReportRequest = optional_json(&body)?;
    let rid = report_id.to_string();
    let user_id = claims.sub.to_string();

    let row = blocking(&state, move |db| {
        actionable_report(db, &rid, &user_id)?;
        if !db.reject_report(&rid, &user_id, req.note.as_deref())? {
            return Err(ApiError::conflict("Report is no longer pending"));
        }
        db.get_report(&rid)?.ok_or_else(|| ApiError::not_found("Report"))
    })
    .await?;

    info!("{} rejected report {}", claims.username, report_id);
    Ok(Json(convert::report(row)?))
}
