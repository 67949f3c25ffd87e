use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use osiris_db::Database;
use osiris_db::models::ThemeRow;
use osiris_types::api::{Claims, CreateThemeRequest, UpdateThemeRequest};

use crate::error::ApiError;
use crate::middleware::JsonBody;
use crate::{AppState, blocking, convert};

const MAX_THEMES: i64 = 20;
const MAX_NAME: usize = 50;

pub const COLOR_SLOTS: &[&str] = &[
    "background",
    "foreground",
    "primary",
    "secondary",
    "accent",
    "muted",
    "border",
    "card",
];

/// `#rgb` or `#rrggbb`.
pub fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

pub fn validate_colors(colors: &BTreeMap<String, String>) -> Result<(), ApiError> {
    for (slot, value) in colors {
        if !COLOR_SLOTS.contains(&slot.as_str()) {
            return Err(ApiError::bad_request(format!("Unknown colour slot '{}'", slot)));
        }
        if !is_hex_color(value) {
            return Err(ApiError::bad_request(format!(
                "Colour for '{}' must be #rgb or #rrggbb",
                slot
            )));
        }
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(1..=MAX_NAME).contains(&len) {
        return Err(ApiError::bad_request(format!("Theme name must be 1-{} characters", MAX_NAME)));
    }
    Ok(name.to_string())
}

fn encode_colors(colors: &BTreeMap<String, String>) -> Result<String, ApiError> {
    serde_json::to_string(colors).map_err(|e| ApiError::Internal(e.into()))
}

/// A theme owned by `user_id`. Other users' themes look missing.
fn owned_theme(db: &Database, id: &str, user_id: &str) -> Result<ThemeRow, ApiError> {
    match db.get_theme(id)? {
        Some(theme) if theme.owner_id == user_id => Ok(theme),
        _ => Err(ApiError::not_found("Theme")),
    }
}

fn active_theme_id(db: &Database, user_id: &str) -> Result<Option<String>, ApiError> {
    Ok(db.get_user(user_id)?.and_then(|u| u.active_theme_id))
}

pub async fn list_themes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let (rows, active) = blocking(&state, move |db| {
        let rows = db.list_themes(&user_id)?;
        Ok((rows, active_theme_id(db, &user_id)?))
    })
    .await?;

    let themes = rows
        .into_iter()
        .map(|row| convert::theme(row, active.as_deref()))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(themes))
}

pub async fn create_theme(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<CreateThemeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate_name(&req.name)?;
    validate_colors(&req.colors)?;
    let colors = encode_colors(&req.colors)?;

    let theme_id = Uuid::new_v4().to_string();
    let user_id = claims.sub.to_string();
    let row = blocking(&state, move |db| {
        if !db.insert_theme(&theme_id, &user_id, &name, &colors, MAX_THEMES)? {
            return Err(ApiError::bad_request(format!("At most {} themes per user", MAX_THEMES)));
        }
        db.get_theme(&theme_id)?
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("theme {} vanished after insert", theme_id)))
    })
    .await?;

    info!("{} created theme '{}'", claims.username, row.name);
    Ok((StatusCode::CREATED, Json(convert::theme(row, None)?)))
}

pub async fn update_theme(
    State(state): State<AppState>,
    Path(theme_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): JsonBody<UpdateThemeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.as_deref().map(validate_name).transpose()?;
    let colors = match &req.colors {
        Some(colors) => {
            validate_colors(colors)?;
            Some(encode_colors(colors)?)
        }
        None => None,
    };

    let tid = theme_id.to_string();
    let user_id = claims.sub.to_string();
    let (row, active) = blocking(&state, move |db| {
        owned_theme(db, &tid, &user_id)?;
        db.update_theme(&tid, name.as_deref(), colors.as_deref())?;
        let row = owned_theme(db, &tid, &user_id)?;
        Ok((row, active_theme_id(db, &user_id)?))
    })
    .await?;

    Ok(Json(convert::theme(row, active.as_deref())?))
}

pub async fn delete_theme(
    State(state): State<AppState>,
    Path(theme_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let tid = theme_id.to_string();
    let user_id = claims.sub.to_string();
    blocking(&state, move |db| {
        owned_theme(db, &tid, &user_id)?;
        if !db.delete_theme(&tid)? {
            return Err(ApiError::not_found("Theme"));
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate_theme(
    State(state): State<AppState>,
    Path(theme_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let tid = theme_id.to_string();
    let user_id = claims.sub.to_string();
    let row = blocking(&state, move |db| {
        let row = owned_theme(db, &tid, &user_id)?;
        db.set_active_theme(&user_id, Some(&tid))?;
        Ok(row)
    })
    .await?;

    let active = row.id.clone();
    Ok(Json(convert::theme(row, Some(&active))?))
}

/// Public: the theme a user currently has active.
pub async fn get_user_theme(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user_id.to_string();
    let row = blocking(&state, move |db| Ok(db.get_active_theme(&uid)?))
        .await?
        .ok_or_else(|| ApiError::not_found("Theme"))?;

    let active = row.id.clone();
    Ok(Json(convert::theme(row, Some(&active))?))
}
