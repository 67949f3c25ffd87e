pub mod auth;
pub mod comments;
pub mod communities;
pub mod convert;
pub mod error;
pub mod follows;
pub mod gateway;
pub mod messages;
pub mod middleware;
pub mod moderation;
pub mod notifications;
pub mod notify;
pub mod permissions;
pub mod posts;
pub mod reactions;
pub mod reports;
pub mod sniff;
pub mod themes;
pub mod uploads;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use tracing::error;

use osiris_db::Database;
use osiris_gateway::dispatcher::Dispatcher;

use crate::error::ApiError;
use crate::moderation::WordFilter;

pub type AppState = Arc<AppStateInner>;

/// Runtime settings handed to the handlers.
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub banned_words: Vec<String>,
}

pub struct AppStateInner {
    pub db: Database,
    pub settings: Settings,
    pub word_filter: WordFilter,
    pub dispatcher: Dispatcher,
}

impl AppStateInner {
    pub fn new(db: Database, settings: Settings, dispatcher: Dispatcher) -> AppState {
        let word_filter = WordFilter::new(&settings.banned_words);
        Arc::new(Self {
            db,
            settings,
            word_filter,
            dispatcher,
        })
    }
}

/// Run blocking database work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
}

/// Page size from a `limit` query parameter.
pub(crate) fn page_limit(limit: Option<u32>, default: u32, max: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, max)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Every REST route plus the `/ws` gateway.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/posts", get(posts::list_posts))
        .route("/api/posts/{id}", get(posts::get_post))
        .route("/api/posts/{id}/comments", get(comments::list_comments))
        .route("/api/users/{id}", get(users::get_user))
        .route("/api/users/{id}/posts", get(users::list_user_posts))
        .route("/api/users/{id}/followers", get(follows::list_followers))
        .route("/api/users/{id}/following", get(follows::list_following))
        .route("/api/users/{id}/theme", get(themes::get_user_theme))
        .route("/api/communities", get(communities::list_communities))
        .route("/api/communities/{slug}", get(communities::get_community))
        .route("/api/communities/{slug}/members", get(communities::list_members))
        .route("/api/communities/{slug}/posts", get(communities::list_community_posts))
        .route("/api/uploads/{id}", get(uploads::download))
        .route("/ws", get(gateway::ws_upgrade));

    let protected_routes = Router::new()
        .route("/api/user", get(users::me).patch(users::update_me))
        .route(
            "/api/uploads",
            post(uploads::upload).layer(DefaultBodyLimit::max(state.settings.max_upload_bytes)),
        )
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/{id}", patch(posts::update_post).delete(posts::delete_post))
        .route("/api/posts/{id}/reactions", post(reactions::react_to_post))
        .route("/api/posts/{id}/comments", post(comments::create_comment))
        .route("/api/feed", get(posts::feed))
        .route(
            "/api/comments/{id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        .route("/api/comments/{id}/like", post(reactions::like_comment))
        .route("/api/follow/{id}", post(follows::follow).delete(follows::unfollow))
        .route("/api/communities", post(communities::create_community))
        .route(
            "/api/communities/{slug}",
            patch(communities::update_community).delete(communities::delete_community),
        )
        .route("/api/communities/{slug}/join", post(communities::join))
        .route("/api/communities/{slug}/leave", post(communities::leave))
        .route("/api/communities/{slug}/members/{user_id}/role", put(communities::set_role))
        .route(
            "/api/communities/{slug}/bans",
            get(communities::list_bans).post(communities::ban),
        )
        .route("/api/communities/{slug}/bans/{user_id}", delete(communities::unban))
        .route("/api/reports", get(reports::list_reports).post(reports::create_report))
        .route("/api/reports/{id}/resolve", post(reports::resolve_report))
        .route("/api/reports/{id}/reject", post(reports::reject_report))
        .route("/api/user/themes", get(themes::list_themes).post(themes::create_theme))
        .route(
            "/api/user/themes/{id}",
            put(themes::update_theme).delete(themes::delete_theme),
        )
        .route("/api/user/themes/{id}/activate", post(themes::activate_theme))
        .route("/api/messages", get(messages::list_conversations).post(messages::send_message))
        .route("/api/messages/{user_id}", get(messages::get_thread))
        .route("/api/messages/{user_id}/read", post(messages::mark_read))
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .route("/api/notifications/{id}", delete(notifications::delete_notification))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
