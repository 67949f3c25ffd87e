mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{PASSWORD, TestApp};

#[tokio::test]
async fn register_login_and_me() {
    let app = TestApp::new();
    let ada = app.register("ada").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "ada", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], ada.id.as_str());
    assert_eq!(body["username"], "ada");

    let (status, me) = app.get("/api/user", Some(&ada.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ada");
    assert_eq!(me["display_name"], "ada");
    assert_eq!(me["karma"], 0);
}

#[tokio::test]
async fn first_user_is_admin() {
    let app = TestApp::new();
    let first = app.register("first").await;
    let second = app.register("second").await;

    let (_, me) = app.get("/api/user", Some(&first.token)).await;
    assert_eq!(me["is_admin"], true);
    let (_, me) = app.get("/api/user", Some(&second.token)).await;
    assert_eq!(me["is_admin"], false);
}

#[tokio::test]
async fn duplicate_usernames_conflict_case_insensitively() {
    let app = TestApp::new();
    app.register("grace").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "username": "Grace", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn invalid_credentials_are_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "username": "no spaces", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "username": "shortpw", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.register("linus").await;
    let (status, _) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "linus", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/user", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let (status, _) = app.get("/api/user", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_a_json_400() {
    let app = TestApp::new();
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = app.request(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn profiles_and_follows() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;

    let (status, _) = app
        .call("PATCH", "/api/user", Some(&ada.token), Some(json!({ "bio": "hello" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post(&format!("/api/follow/{}", ada.id), &bob.token, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post(&format!("/api/follow/{}", ada.id), &bob.token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.post(&format!("/api/follow/{}", bob.id), &bob.token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, profile) = app.get(&format!("/api/users/{}", ada.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["bio"], "hello");
    assert_eq!(profile["follower_count"], 1);
    assert_eq!(profile["following_count"], 0);

    let (_, followers) = app.get(&format!("/api/users/{}/followers", ada.id), None).await;
    assert_eq!(followers[0]["username"], "bob");
    assert!(app.notification_kinds(&ada).await.contains(&"new_follower".to_string()));

    let (status, _) = app
        .call("DELETE", &format!("/api/follow/{}", ada.id), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call("DELETE", &format!("/api/follow/{}", ada.id), Some(&bob.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&format!("/api/users/{}", uuid::Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn banned_words_block_names() {
    let app = TestApp::with_banned_words(&["badword"]);
    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "username": "nice", "password": PASSWORD, "display_name": "a badword here" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("badword"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_of_one_name_conflict() {
    let app = std::sync::Arc::new(TestApp::new());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                let body = json!({ "username": "dup_user", "password": PASSWORD });
                app.call("POST", "/api/auth/register", None, Some(body)).await.0
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1, "{:?}", statuses);
    assert!(
        statuses
            .iter()
            .all(|s| *s == StatusCode::CREATED || *s == StatusCode::CONFLICT),
        "{:?}",
        statuses
    );
}
