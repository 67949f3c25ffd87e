mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn conversations_and_read_state() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;

    for text in ["hi bob", "are you there?"] {
        let (status, message) = app
            .post("/api/messages", &ada.token, json!({ "recipient_id": bob.id, "content": text }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message["recipient_id"], bob.id.as_str());
        assert!(message["read_at"].is_null());
    }

    let (status, conversations) = app.get("/api/messages", Some(&bob.token)).await;
    assert_eq!(status, StatusCode::OK);
    let conversations = conversations.as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["partner"]["username"], "ada");
    assert_eq!(conversations[0]["last_message"]["content"], "are you there?");
    assert_eq!(conversations[0]["unread"], 2);

    let (status, thread) = app.get(&format!("/api/messages/{}", ada.id), Some(&bob.token)).await;
    assert_eq!(status, StatusCode::OK);
    let thread = thread.as_array().unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0]["content"], "are you there?");

    let (_, page) = app
        .get(&format!("/api/messages/{}?limit=1", ada.id), Some(&bob.token))
        .await;
    assert_eq!(page.as_array().unwrap().len(), 1);

    let (status, marked) = app
        .post(&format!("/api/messages/{}/read", ada.id), &bob.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["marked"], 2);
    let (_, conversations) = app.get("/api/messages", Some(&bob.token)).await;
    assert_eq!(conversations[0]["unread"], 0);

    // Ada's own messages never count as unread for her.
    let (_, conversations) = app.get("/api/messages", Some(&ada.token)).await;
    assert_eq!(conversations[0]["unread"], 0);
}

#[tokio::test]
async fn invalid_messages() {
    let app = TestApp::with_banned_words(&["scam"]);
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;

    let (status, _) = app
        .post("/api/messages", &ada.token, json!({ "recipient_id": ada.id, "content": "me" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/messages",
            &ada.token,
            json!({ "recipient_id": uuid::Uuid::new_v4(), "content": "hello?" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/api/messages", &ada.token, json!({ "recipient_id": bob.id, "content": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/messages",
            &ada.token,
            json!({ "recipient_id": bob.id, "content": "x".repeat(2001) }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/messages", &ada.token, json!({ "recipient_id": bob.id, "content": "not a scam" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
