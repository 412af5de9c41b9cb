mod common;

use serde_json::{json, Value};

#[tokio::test]
async fn register_returns_tokens_and_permissions() {
    let Some(app) = common::spawn_app().await else {
        return;
    };

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({
            "name": "Li Bai",
            "pen_name": "Taibai",
            "email": "Li.Bai@Example.com",
            "password": common::PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert!(resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .any(|v| v.to_str().unwrap().starts_with("refresh_token=")));

    let body: Value = resp.json().await.unwrap();
    let user = &body["data"]["user"];
    assert_eq!(user["email"], "li.bai@example.com");
    assert_eq!(user["display_name"], "Taibai");
    assert_eq!(user["role"], "user");
    let permissions: Vec<&str> = user["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert!(permissions.contains(&"create_poem"));
    assert!(!permissions.contains(&"review_poems"));
    assert!(user.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let user = common::register_user(&app, "dup").await;

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({
            "name": "Someone Else",
            "email": user.email.to_uppercase(),
            "password": common::PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn short_password_is_rejected() {
    let Some(app) = common::spawn_app().await else {
        return;
    };

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({
            "name": "Short",
            "email": "short_password@test.com",
            "password": "abc",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn login_and_me() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let user = common::register_user(&app, "login").await;

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": user.email, "password": "wrong_password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": user.email, "password": common::PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let token = body["data"]["token"].as_str().unwrap();

    let resp = app
        .client
        .get(app.url("/auth/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], user.id);
}

#[tokio::test]
async fn me_requires_token() {
    let Some(app) = common::spawn_app().await else {
        return;
    };

    let resp = app.client.get(app.url("/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .get(app.url("/auth/me"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn refresh_token_cannot_be_used_as_access_token() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let user = common::register_user(&app, "wrongtype").await;

    let resp = app
        .client
        .get(app.url("/auth/me"))
        .bearer_auth(&user.refresh_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn refresh_rotates_and_rejects_reuse() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let user = common::register_user(&app, "refresh").await;

    let resp = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh_token": user.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let rotated = body["data"]["refresh_token"].as_str().unwrap();
    assert_ne!(rotated, user.refresh_token);

    // the old token was consumed by the rotation
    let resp = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh_token": user.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh_token": rotated }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let user = common::register_user(&app, "logout").await;

    let resp = app
        .client
        .post(app.url("/auth/logout"))
        .bearer_auth(&user.token)
        .json(&json!({ "refresh_token": user.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh_token": user.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn change_password_signs_out_sessions() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let user = common::register_user(&app, "chpw").await;

    let resp = app
        .client
        .put(app.url("/auth/password"))
        .bearer_auth(&user.token)
        .json(&json!({ "current_password": "not_my_password", "new_password": "new_password_456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = app
        .client
        .put(app.url("/auth/password"))
        .bearer_auth(&user.token)
        .json(&json!({ "current_password": common::PASSWORD, "new_password": "new_password_456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .post(app.url("/auth/refresh"))
        .json(&json!({ "refresh_token": user.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": user.email, "password": "new_password_456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn profile_update_shows_on_public_profile() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let user = common::register_user(&app, "profile").await;

    let resp = app
        .client
        .put(app.url("/auth/profile"))
        .bearer_auth(&user.token)
        .json(&json!({ "pen_name": "Du Fu", "bio": "Sage of poetry" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .get(app.url(&format!("/users/{}", user.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["display_name"], "Du Fu");
    assert_eq!(body["data"]["bio"], "Sage of poetry");
    assert_eq!(body["data"]["published_poems"], 0);
    assert!(body["data"].get("email").is_none());
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let Some(app) = common::spawn_app().await else {
        return;
    };

    let resp = app
        .client
        .get(app.url("/users/999999"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
