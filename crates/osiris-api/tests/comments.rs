mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn threads_and_notifications() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let carol = app.register("carol").await;
    let post_id = app.create_post(&ada, "Thread", "discussion").await;

    let top = app.create_comment(&bob, &post_id, "first!").await;
    let (status, reply) = app
        .post(
            &format!("/api/posts/{}/comments", post_id),
            &carol.token,
            json!({ "content": "reply", "parent_id": top }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["parent_id"], top.as_str());

    let (status, comments) = app.get(&format!("/api/posts/{}/comments", post_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comments.as_array().unwrap().len(), 2);

    let (_, post) = app.get(&format!("/api/posts/{}", post_id), None).await;
    assert_eq!(post["comment_count"], 2);

    assert_eq!(
        app.notification_kinds(&ada).await,
        vec!["new_comment".to_string(), "new_comment".to_string()]
    );
    assert_eq!(app.notification_kinds(&bob).await, vec!["new_reply".to_string()]);
}

#[tokio::test]
async fn replying_to_the_post_author_notifies_once() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let post_id = app.create_post(&ada, "Thread", "discussion").await;
    let own = app.create_comment(&ada, &post_id, "author speaking").await;

    let (status, _) = app
        .post(
            &format!("/api/posts/{}/comments", post_id),
            &bob.token,
            json!({ "content": "answer", "parent_id": own }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.notification_kinds(&ada).await, vec!["new_reply".to_string()]);
}

#[tokio::test]
async fn parents_must_be_on_the_same_post() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let one = app.create_post(&ada, "One", "news").await;
    let two = app.create_post(&ada, "Two", "news").await;
    let elsewhere = app.create_comment(&ada, &one, "here").await;

    let (status, _) = app
        .post(
            &format!("/api/posts/{}/comments", two),
            &ada.token,
            json!({ "content": "lost", "parent_id": elsewhere }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(&format!("/api/posts/{}/comments", two), &ada.token, json!({ "content": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = app
        .post(&format!("/api/posts/{}/comments", missing), &ada.token, json!({ "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&format!("/api/posts/{}/comments", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edit_and_delete_permissions() {
    let app = TestApp::new();
    let admin = app.register("admin").await;
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let post_id = app.create_post(&ada, "Post", "news").await;
    let comment = app.create_comment(&bob, &post_id, "original").await;
    let uri = format!("/api/comments/{}", comment);

    let (status, _) = app
        .call("PATCH", &uri, Some(&ada.token), Some(json!({ "content": "not mine" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("PATCH", &uri, Some(&bob.token), Some(json!({ "content": "edited" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "edited");
    assert!(body["edited_at"].is_string());

    let (status, _) = app.call("DELETE", &uri, Some(&ada.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call("DELETE", &uri, Some(&admin.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("DELETE", &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_comment_removes_its_replies() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let post_id = app.create_post(&ada, "Post", "news").await;
    let parent = app.create_comment(&ada, &post_id, "parent").await;
    app.post(
        &format!("/api/posts/{}/comments", post_id),
        &ada.token,
        json!({ "content": "child", "parent_id": parent }),
    )
    .await;

    let (status, _) = app
        .call("DELETE", &format!("/api/comments/{}", parent), Some(&ada.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, comments) = app.get(&format!("/api/posts/{}/comments", post_id), None).await;
    assert!(comments.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn banned_users_cannot_comment_in_the_community() {
    let app = TestApp::new();
    let owner = app.register("owner").await;
    let troll = app.register("troll").await;
    let (slug, community_id) = app.create_community(&owner, "Quiet Place").await;

    let (status, post) = app
        .post(
            "/api/posts",
            &owner.token,
            json!({ "title": "Rules", "content": "be nice", "category": "discussion", "community_id": community_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comments = format!("/api/posts/{}/comments", post["id"].as_str().unwrap());

    // Commenting needs no membership, only the absence of a ban.
    let (status, _) = app.post(&comments, &troll.token, json!({ "content": "hi" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post(
            &format!("/api/communities/{}/bans", slug),
            &owner.token,
            json!({ "user_id": troll.id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.post(&comments, &troll.token, json!({ "content": "again" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("banned"));

    let outside = app.create_post(&owner, "Outside", "news").await;
    let troll_comment = app.create_comment(&troll, &outside, "still here").await;
    assert!(!troll_comment.is_empty());
}
