#![allow(dead_code)]

use reqwest::Client;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Once,
};
use tokio::sync::OnceCell;

static INIT: Once = Once::new();
static SCHEMA_READY: OnceCell<()> = OnceCell::const_new();
static USER_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub const PASSWORD: &str = "test_password_123";

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var(
            "JWT_SECRET",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        // many requests per test from one address
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        std::env::set_var("BCRYPT_COST", "4");
        std::env::remove_var("REQUIRE_EMAIL_VERIFICATION");
        let config = shiji::config::jwt::JwtConfig::from_env().unwrap();
        let _ = shiji::utils::jwt::init_jwt_config(config);
    });
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.addr, path)
    }
}

pub struct TestUser {
    pub id: i32,
    pub email: String,
    pub token: String,
    pub refresh_token: String,
}

/// Start the API on a random port. `None` when no test database is configured,
/// in which case the calling test returns early.
pub async fn spawn_app() -> Option<TestApp> {
    init_env();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;

    let db = sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    // Tests in one binary run concurrently, so the schema is reset only once.
    SCHEMA_READY
        .get_or_init(|| async {
            shiji::migration::Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");
            cleanup_tables(&db).await;
        })
        .await;

    let email_service = shiji::services::email::EmailService::disabled();

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        .merge(shiji::routes::create_routes())
        .layer(axum::middleware::from_fn(
            shiji::middleware::security_headers_middleware,
        ))
        .layer(axum::extract::Extension(db.clone()))
        .layer(axum::extract::Extension(email_service));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    Some(TestApp {
        addr: format!("http://{}", addr),
        db,
        client: Client::new(),
    })
}

async fn cleanup_tables(db: &DatabaseConnection) {
    let tables = [
        "application_reviews",
        "author_applications",
        "refresh_tokens",
        "poem_likes",
        "poem_comments",
        "poems",
        "users",
    ];

    for table in tables {
        let sql = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", table);
        let _ = db
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql,
            ))
            .await;
    }
}

/// Register a fresh account with a unique email.
pub async fn register_user(app: &TestApp, prefix: &str) -> TestUser {
    let n = USER_COUNTER.fetch_add(1, Ordering::SeqCst);
    let email = format!("{}_{}_{}@test.com", prefix, std::process::id(), n);

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({
            "name": format!("{} {}", prefix, n),
            "email": email,
            "password": PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to register user");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse register response");
    assert!(
        body["success"].as_bool().unwrap_or(false),
        "Failed to register '{}': status={}, body={}",
        email,
        status,
        body
    );

    TestUser {
        id: body["data"]["user"]["id"].as_i64().unwrap() as i32,
        email,
        token: body["data"]["token"].as_str().unwrap().to_string(),
        refresh_token: body["data"]["refresh_token"].as_str().unwrap().to_string(),
    }
}

/// Register a user and give it `role` directly in the database. Roles are
/// read per request, so the returned token already carries the new role.
pub async fn register_with_role(app: &TestApp, prefix: &str, role: &str) -> TestUser {
    let user = register_user(app, prefix).await;
    set_role(&app.db, user.id, role).await;
    user
}

pub async fn set_role(db: &DatabaseConnection, user_id: i32, role: &str) {
    db.execute(Statement::from_sql_and_values(
        sea_orm::DatabaseBackend::Postgres,
        "UPDATE users SET role = $1 WHERE id = $2",
        vec![role.into(), user_id.into()],
    ))
    .await
    .expect("Failed to set role");
}

/// Create a draft poem and return its id.
pub async fn create_poem(app: &TestApp, token: &str, title: &str, content: &str) -> i32 {
    let resp = app
        .client
        .post(app.url("/poems"))
        .bearer_auth(token)
        .json(&json!({ "title": title, "content": content, "tags": ["moon"] }))
        .send()
        .await
        .expect("Failed to create poem");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse poem response");
    assert_eq!(status, 200, "create poem failed: {}", body);
    body["data"]["id"].as_i64().unwrap() as i32
}

pub async fn set_poem_status(
    app: &TestApp,
    token: &str,
    poem_id: i32,
    status: &str,
) -> reqwest::Response {
    app.client
        .put(app.url(&format!("/poems/{}/status", poem_id)))
        .bearer_auth(token)
        .json(&json!({ "status": status }))
        .send()
        .await
        .expect("Failed to change poem status")
}

/// Draft -> under_review by the author, then published by `reviewer_token`.
pub async fn publish_poem(app: &TestApp, author_token: &str, reviewer_token: &str, poem_id: i32) {
    let resp = set_poem_status(app, author_token, poem_id, "under_review").await;
    assert_eq!(resp.status(), 200);
    let resp = set_poem_status(app, reviewer_token, poem_id, "published").await;
    assert_eq!(resp.status(), 200);
}
