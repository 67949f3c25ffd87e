use std::convert::Infallible;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::WithRejection;
use serde::de::DeserializeOwned;

use osiris_gateway::connection::verify_token;
use osiris_types::api::Claims;

use crate::AppState;
use crate::error::ApiError;

/// JSON body whose rejections come back as `{"error": ...}` 400s.
pub type JsonBody<T> = WithRejection<Json<T>, ApiError>;

/// Parse an optional JSON body; an empty body yields the default.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    let claims = verify_token(token, &state.settings.jwt_secret).ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Optional caller on public routes. A missing or invalid token means anonymous.
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    pub fn id(&self) -> Option<String> {
        self.0.as_ref().map(|c| c.sub.to_string())
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_token(&parts.headers).and_then(|t| verify_token(t, &state.settings.jwt_secret));
        Ok(Viewer(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[derive(Debug, Default, serde::Deserialize)]
    struct Note {
        note: Option<String>,
    }

    #[test]
    fn empty_bodies_use_defaults() {
        assert!(optional_json::<Note>(b"").unwrap().note.is_none());
        assert!(optional_json::<Note>(b"  \n").unwrap().note.is_none());
        assert_eq!(optional_json::<Note>(br#"{"note":"ok"}"#).unwrap().note.as_deref(), Some("ok"));
        assert!(optional_json::<Note>(b"{").is_err());
    }
}
