mod common;

use serde_json::{json, Value};

#[tokio::test]
async fn stats_require_view_stats() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let admin = common::register_with_role(&app, "admin", "admin").await;
    let moderator = common::register_with_role(&app, "mod", "moderator").await;

    let resp = app
        .client
        .get(app.url("/admin/stats"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["total_users"].as_u64().unwrap() >= 2);
    assert!(body["data"]["users_today"].as_u64().unwrap() >= 2);
    assert!(body["data"]["poems_under_review"].is_number());
    assert!(body["data"]["pending_applications"].is_number());

    let resp = app
        .client
        .get(app.url("/admin/stats"))
        .bearer_auth(&moderator.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn poem_review_queue() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let author = common::register_user(&app, "author").await;
    let moderator = common::register_with_role(&app, "mod", "moderator").await;
    let poem_id = common::create_poem(&app, &author.token, "Queued", "Rain on the river").await;
    common::set_poem_status(&app, &author.token, poem_id, "under_review").await;

    let resp = app
        .client
        .get(app.url("/admin/poems?per_page=100"))
        .bearer_auth(&moderator.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let items = body["data"]["items"].as_array().unwrap();
    assert!(items.iter().any(|p| p["id"] == poem_id));
    assert!(items.iter().all(|p| p["status"] == "under_review"));

    let resp = app
        .client
        .get(app.url("/admin/poems"))
        .bearer_auth(&author.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn list_users_filters_by_role() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let admin = common::register_with_role(&app, "admin", "admin").await;
    let moderator = common::register_with_role(&app, "mod", "moderator").await;

    let resp = app
        .client
        .get(app.url("/admin/users?role=moderator&per_page=100"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let items = body["data"]["items"].as_array().unwrap();
    assert!(items.iter().any(|u| u["id"] == moderator.id));
    assert!(items.iter().all(|u| u["role"] == "moderator"));

    let resp = app
        .client
        .get(app.url("/admin/users"))
        .bearer_auth(&moderator.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn superadmin_changes_roles() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let superadmin = common::register_with_role(&app, "root", "superadmin").await;
    let user = common::register_user(&app, "promoted").await;
    let role_url = app.url(&format!("/admin/users/{}/role", user.id));

    let resp = app
        .client
        .get(app.url("/admin/poems"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .put(&role_url)
        .bearer_auth(&superadmin.token)
        .json(&json!({ "role": "moderator" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "moderator");

    // the existing token picks up the new role on the next request
    let resp = app
        .client
        .get(app.url("/admin/poems"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .put(&role_url)
        .bearer_auth(&superadmin.token)
        .json(&json!({ "role": "emperor" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn admin_cannot_change_roles() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let admin = common::register_with_role(&app, "admin", "admin").await;
    let user = common::register_user(&app, "target").await;

    let resp = app
        .client
        .put(app.url(&format!("/admin/users/{}/role", user.id)))
        .bearer_auth(&admin.token)
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn superadmin_cannot_change_own_role() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let superadmin = common::register_with_role(&app, "root", "superadmin").await;

    let resp = app
        .client
        .put(app.url(&format!("/admin/users/{}/role", superadmin.id)))
        .bearer_auth(&superadmin.token)
        .json(&json!({ "role": "user" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = app
        .client
        .put(app.url("/admin/users/999999/role"))
        .bearer_auth(&superadmin.token)
        .json(&json!({ "role": "user" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn revoke_sessions_invalidates_refresh_tokens() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let superadmin = common::register_with_role(&app, "root", "superadmin").await;
    let user = common::register_user(&app, "revoked").await;

    let resp = app
        .client
        .post(app.url(&format!("/admin/users/{}/revoke-sessions", user.id)))
        .bearer_auth(&superadmin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["revoked"], 1);

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
async fn reset_user_password() {
    let Some(app) = common::spawn_app().await else {
        return;
    };
    let superadmin = common::register_with_role(&app, "root", "superadmin").await;
    let admin = common::register_with_role(&app, "admin", "admin").await;
    let user = common::register_user(&app, "forgetful").await;
    let url = app.url(&format!("/admin/users/{}/password", user.id));

    let resp = app
        .client
        .put(&url)
        .bearer_auth(&admin.token)
        .json(&json!({ "new_password": "brand_new_password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .put(&url)
        .bearer_auth(&superadmin.token)
        .json(&json!({ "new_password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = app
        .client
        .put(&url)
        .bearer_auth(&superadmin.token)
        .json(&json!({ "new_password": "brand_new_password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": user.email, "password": common::PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": user.email, "password": "brand_new_password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
