#![allow(dead_code)]

use std::path::PathBuf;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use osiris_api::{AppState, AppStateInner, Settings, router};
use osiris_db::Database;
use osiris_gateway::dispatcher::Dispatcher;

pub const SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub upload_dir: PathBuf,
}

pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_banned_words(&[])
    }

    pub fn with_banned_words(words: &[&str]) -> Self {
        let upload_dir = std::env::temp_dir().join(format!("osiris-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&upload_dir).unwrap();

        let settings = Settings {
            jwt_secret: SECRET.to_string(),
            token_ttl_days: 1,
            upload_dir: upload_dir.clone(),
            max_upload_bytes: 64 * 1024,
            banned_words: words.iter().map(|w| w.to_string()).collect(),
        };
        let db = Database::open_in_memory().unwrap();
        let state = AppStateInner::new(db, settings, Dispatcher::new());
        Self {
            router: router(state.clone()),
            state,
            upload_dir,
        }
    }

    pub async fn request(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.request(req).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(token), Some(body)).await
    }

    pub async fn register(&self, username: &str) -> TestUser {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(serde_json::json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {}: {}", username, body);
        TestUser {
            id: body["user_id"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// A plain text post outside any community.
    pub async fn create_post(&self, user: &TestUser, title: &str, category: &str) -> String {
        let (status, body) = self
            .post(
                "/api/posts",
                &user.token,
                serde_json::json!({ "title": title, "content": "body text", "category": category }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create post: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn create_comment(&self, user: &TestUser, post_id: &str, content: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/api/posts/{}/comments", post_id),
                &user.token,
                serde_json::json!({ "content": content }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create comment: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Create a community owned by `owner` and return its slug.
    pub async fn create_community(&self, owner: &TestUser, name: &str) -> (String, String) {
        let (status, body) = self
            .post("/api/communities", &owner.token, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create community: {}", body);
        (
            body["slug"].as_str().unwrap().to_string(),
            body["id"].as_str().unwrap().to_string(),
        )
    }

    pub async fn notification_kinds(&self, user: &TestUser) -> Vec<String> {
        let (status, body) = self.get("/api/notifications", Some(&user.token)).await;
        assert_eq!(status, StatusCode::OK);
        body["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["kind"].as_str().unwrap().to_string())
            .collect()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}
