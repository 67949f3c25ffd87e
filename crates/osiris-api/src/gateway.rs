use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;

use osiris_gateway::connection::{self, verify_token};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::bearer_token;

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

/// GET /ws: a token at upgrade time authenticates immediately; without one
/// the socket must send `identify` first. A token that fails to verify is refused.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let dispatcher = state.dispatcher.clone();
    let token = query.token.as_deref().or_else(|| bearer_token(&headers));

    match token {
        Some(token) => {
            let claims = verify_token(token, &state.settings.jwt_secret).ok_or(ApiError::Unauthorized)?;
            Ok(ws.on_upgrade(move |socket| {
                connection::handle_connection_authenticated(socket, dispatcher, claims.sub, claims.username)
            }))
        }
        None => {
            let secret = state.settings.jwt_secret.clone();
            Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, secret)))
        }
    }
}
