mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn create_activate_and_delete() {
    let app = TestApp::new();
    let ada = app.register("ada").await;

    let (status, theme) = app
        .post(
            "/api/user/themes",
            &ada.token,
            json!({ "name": "Midnight", "colors": { "background": "#000", "accent": "#ff8800" } }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(theme["active"], false);
    assert_eq!(theme["colors"]["accent"], "#ff8800");
    let theme_id = theme["id"].as_str().unwrap().to_string();

    let (status, _) = app.get(&format!("/api/users/{}/theme", ada.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, active) = app
        .post(&format!("/api/user/themes/{}/activate", theme_id), &ada.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["active"], true);

    let (status, public) = app.get(&format!("/api/users/{}/theme", ada.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["name"], "Midnight");
    let (_, me) = app.get("/api/user", Some(&ada.token)).await;
    assert_eq!(me["active_theme_id"], theme_id.as_str());

    let (status, updated) = app
        .call(
            "PUT",
            &format!("/api/user/themes/{}", theme_id),
            Some(&ada.token),
            Some(json!({ "name": "Dusk" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Dusk");
    assert_eq!(updated["active"], true);
    assert_eq!(updated["colors"]["background"], "#000");

    let (status, _) = app
        .call("DELETE", &format!("/api/user/themes/{}", theme_id), Some(&ada.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, me) = app.get("/api/user", Some(&ada.token)).await;
    assert!(me["active_theme_id"].is_null());
    let (status, _) = app.get(&format!("/api/users/{}/theme", ada.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn colors_are_validated() {
    let app = TestApp::new();
    let ada = app.register("ada").await;

    for colors in [
        json!({ "sidebar": "#000" }),
        json!({ "background": "black" }),
        json!({ "background": "#00000" }),
    ] {
        let (status, _) = app
            .post("/api/user/themes", &ada.token, json!({ "name": "Bad", "colors": colors }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = app
        .post("/api/user/themes", &ada.token, json!({ "name": "", "colors": {} }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn themes_are_private_to_their_owner() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    let bob = app.register("bob").await;
    let (_, theme) = app
        .post("/api/user/themes", &ada.token, json!({ "name": "Mine", "colors": {} }))
        .await;
    let theme_id = theme["id"].as_str().unwrap();

    let uri = format!("/api/user/themes/{}", theme_id);
    let (status, _) = app
        .call("PUT", &uri, Some(&bob.token), Some(json!({ "name": "Stolen" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call("DELETE", &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.post(&format!("{}/activate", uri), &bob.token, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app.get("/api/user/themes", Some(&bob.token)).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn at_most_twenty_themes() {
    let app = TestApp::new();
    let ada = app.register("ada").await;
    for i in 0..20 {
        let (status, _) = app
            .post("/api/user/themes", &ada.token, json!({ "name": format!("Theme {}", i), "colors": {} }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = app
        .post("/api/user/themes", &ada.token, json!({ "name": "One too many", "colors": {} }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app.get("/api/user/themes", Some(&ada.token)).await;
    assert_eq!(list.as_array().unwrap().len(), 20);
}
