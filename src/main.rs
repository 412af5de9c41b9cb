use axum::{extract::Extension, middleware, response::IntoResponse, routing::get, Json, Router};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use shiji::{
    config, handlers, migration, routes,
    services::{bootstrap::ensure_bootstrap_superadmin, cache::CacheService, email::EmailService},
    utils,
};
use std::env;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // Auth
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh_token,
        handlers::auth::get_current_user,
        handlers::auth::change_password,
        handlers::auth::verify_email,
        handlers::auth::resend_verification,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::auth::logout,
        // Users
        handlers::user::get_user_profile,
        handlers::user::update_profile,
        // Poems
        handlers::poem::list_poems,
        handlers::poem::get_poem,
        handlers::poem::list_my_poems,
        handlers::poem::create_poem,
        handlers::poem::update_poem,
        handlers::poem::delete_poem,
        handlers::poem::change_poem_status,
        handlers::poem::toggle_like,
        // Comments
        handlers::comment::list_comments,
        handlers::comment::create_comment,
        handlers::comment::delete_comment,
        // Author applications
        handlers::application::create_application,
        handlers::application::get_my_application,
        handlers::application::get_application,
        handlers::application::update_application,
        handlers::application::change_application_status,
        // Admin
        handlers::admin::list_poems_for_review,
        handlers::admin::list_applications,
        handlers::admin::get_stats,
        handlers::admin::list_users,
        handlers::admin::update_user_role,
        handlers::admin::revoke_user_sessions,
        handlers::admin::reset_user_password,
    ),
    components(
        schemas(
            shiji::response::ApiResponse<serde_json::Value>,
            shiji::response::PaginatedResponse<serde_json::Value>,
            shiji::response::PaginationQuery,
            shiji::error::AppError,
            shiji::permission::Role,
            shiji::permission::Permission,
            shiji::utils::language::Language,
            shiji::workflow::PoemStatus,
            shiji::workflow::ApplicationStatus,
            shiji::workflow::ReviewAction,
            shiji::models::author_application::PortfolioItem,
            // Auth
            handlers::auth::RegisterRequest,
            handlers::auth::LoginRequest,
            handlers::auth::RefreshTokenRequest,
            handlers::auth::AuthResponse,
            handlers::auth::TokenResponse,
            handlers::auth::UserResponse,
            handlers::auth::ChangePasswordRequest,
            handlers::auth::VerifyEmailRequest,
            handlers::auth::ForgotPasswordRequest,
            handlers::auth::ResetPasswordRequest,
            // Users
            handlers::user::PublicProfileResponse,
            handlers::user::UpdateProfileRequest,
            // Poems
            handlers::poem::AuthorSummary,
            handlers::poem::PoemResponse,
            handlers::poem::CreatePoemRequest,
            handlers::poem::UpdatePoemRequest,
            handlers::poem::ChangePoemStatusRequest,
            handlers::poem::LikeResponse,
            // Comments
            handlers::comment::CommentResponse,
            handlers::comment::CreateCommentRequest,
            // Author applications
            handlers::application::ApplicationRequest,
            handlers::application::ChangeApplicationStatusRequest,
            handlers::application::ApplicationResponse,
            handlers::application::ReviewResponse,
            handlers::application::StatusChangeResponse,
            // Admin
            handlers::admin::StatsResponse,
            handlers::admin::AdminUserResponse,
            handlers::admin::UpdateRoleRequest,
            handlers::admin::AdminResetPasswordRequest,
            handlers::admin::RevokeSessionsResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and sessions"),
        (name = "users", description = "Author profiles"),
        (name = "poems", description = "Poem authoring, review and publication"),
        (name = "comments", description = "Comments on published poems"),
        (name = "applications", description = "Author applications"),
        (name = "admin", description = "Review queues and user administration"),
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shiji=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let jwt_config = validate_config()?;
    utils::jwt::init_jwt_config(jwt_config)?;

    tracing::info!("Starting Shiji API v{}...", env!("CARGO_PKG_VERSION"));

    let db = config::database::get_database().await?;
    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    ensure_bootstrap_superadmin(&db)
        .await
        .map_err(|e| anyhow::anyhow!("Superadmin bootstrap failed: {e}"))?;

    // Redis is optional; poems are read straight from the database without it
    let cache = match config::redis::get_redis().await {
        Ok(conn) => {
            tracing::info!("Redis connected successfully");
            Some(CacheService::new(conn))
        }
        Err(e) => {
            tracing::warn!("Redis unavailable, running without cache: {}", e);
            None
        }
    };

    let email_service = EmailService::from_env();
    if email_service.is_configured() {
        tracing::info!("SMTP email service configured");
    } else {
        tracing::warn!("SMTP not configured, emails will be skipped");
    }

    let mut app = create_app()
        .layer(Extension(db))
        .layer(Extension(email_service));

    if let Some(cache) = cache {
        app = app.layer(Extension(cache));
    }

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Fail fast on configuration that would only surface on the first request.
fn validate_config() -> anyhow::Result<config::jwt::JwtConfig> {
    let jwt_config = config::jwt::JwtConfig::from_env()?;

    if env::var("DATABASE_URL").is_err() {
        return Err(anyhow::anyhow!(
            "DATABASE_URL environment variable must be set"
        ));
    }

    Ok(jwt_config)
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        // Cookie auth across origins needs an explicit allow-list
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins).allow_credentials(true)
    }
}

fn create_app() -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(
            shiji::middleware::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service and database health", body = serde_json::Value)
    )
)]
async fn health_check(Extension(db): Extension<DatabaseConnection>) -> impl IntoResponse {
    let db_ok = db
        .query_one(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "Shiji API",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
