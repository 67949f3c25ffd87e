use std::path::Path as FsPath;

use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use osiris_db::models::UploadRow;
use osiris_types::api::{Claims, UploadResponse};

use crate::error::ApiError;
use crate::sniff::{declared_matches, sniff};
use crate::{AppState, blocking};

async fn write_file(path: &FsPath, data: &[u8]) -> anyhow::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

/// POST /api/uploads: raw body, type decided by magic bytes.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    WithRejection(body, _): WithRejection<Bytes, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Upload body is empty"));
    }

    let sniffed = sniff(&body).ok_or_else(|| {
        ApiError::UnsupportedMediaType("Only PNG, JPEG, GIF, WebP, MP4, MOV and WebM files are accepted".into())
    })?;
    let declared = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if !declared_matches(declared, &sniffed) {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Declared type {} does not match file contents ({})",
            declared.unwrap_or_default(),
            sniffed.mime
        )));
    }

    let upload_id = Uuid::new_v4();
    let sha256 = hex::encode(Sha256::digest(&body));
    let path = state.settings.upload_dir.join(upload_id.to_string());
    write_file(&path, &body).await?;

    let row = UploadRow {
        id: upload_id.to_string(),
        owner_id: claims.sub.to_string(),
        mime: sniffed.mime.to_string(),
        kind: sniffed.kind.as_str().to_string(),
        size: body.len() as i64,
        sha256,
        created_at: osiris_db::now(),
    };
    let stored = blocking(&state, move |db| {
        db.insert_upload(&row)?;
        Ok(row)
    })
    .await;
    let row = match stored {
        Ok(row) => row,
        Err(e) => {
            if let Err(io) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove orphaned upload {}: {}", path.display(), io);
            }
            return Err(e);
        }
    };

    info!(
        "{} uploaded {} ({}, {} bytes)",
        claims.username, upload_id, row.mime, row.size
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            upload_id,
            mime: row.mime,
            kind: sniffed.kind,
            size: body.len() as u64,
        }),
    ))
}

/// GET /api/uploads/{id}: stream the stored bytes back.
pub async fn download(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = upload_id.to_string();
    let row = blocking(&state, move |db| Ok(db.get_upload(&uid)?))
        .await?
        .ok_or_else(|| ApiError::not_found("Upload"))?;

    let path = state.settings.upload_dir.join(&row.id);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Upload {} has a row but no file at {}", row.id, path.display());
            return Err(ApiError::not_found("Upload"));
        }
        Err(e) => return Err(ApiError::Internal(e.into())),
    };

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, row.mime),
            (header::CONTENT_LENGTH, row.size.to_string()),
        ],
        body,
    ))
}
