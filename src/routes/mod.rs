use crate::config::rate_limit::{RateLimitConfig, RateLimitGroup};
use crate::handlers;
use crate::middleware::{auth_middleware, optional_auth_middleware};
use axum::{middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

pub fn create_routes() -> Router {
    Router::new().nest("/api", api_routes())
}

fn api_routes() -> Router {
    let rate_limit_config = RateLimitConfig::from_env();

    let auth = auth_routes(&rate_limit_config);
    let public_read = public_read_routes(&rate_limit_config);
    let protected =
        protected_routes(&rate_limit_config).layer(middleware::from_fn(auth_middleware));

    auth.merge(public_read).merge(protected)
}

/// Credential endpoints: register, login, refresh and the email token flows.
fn auth_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/auth/register", routing::post(handlers::register))
        .route("/auth/login", routing::post(handlers::login))
        .route("/auth/refresh", routing::post(handlers::refresh_token))
        .route("/auth/verify-email", routing::post(handlers::verify_email))
        .route(
            "/auth/forgot-password",
            routing::post(handlers::forgot_password),
        )
        .route(
            "/auth/reset-password",
            routing::post(handlers::reset_password),
        );

    with_optional_rate_limit(router, config, RateLimitGroup::Auth)
}

/// Anonymous reads. A single poem may also be read by its author or a
/// reviewer, so that route resolves the caller when a token is present.
fn public_read_routes(config: &RateLimitConfig) -> Router {
    let viewer_aware = Router::new()
        .route("/poems/{id}", routing::get(handlers::poem::get_poem))
        .layer(middleware::from_fn(optional_auth_middleware));

    let router = Router::new()
        .route("/poems", routing::get(handlers::poem::list_poems))
        .route(
            "/poems/{id}/comments",
            routing::get(handlers::comment::list_comments),
        )
        .route(
            "/users/{id}",
            routing::get(handlers::user::get_user_profile),
        )
        .merge(viewer_aware);

    with_optional_rate_limit(router, config, RateLimitGroup::PublicRead)
}

fn protected_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        // Account
        .route("/auth/me", routing::get(handlers::get_current_user))
        .route("/auth/logout", routing::post(handlers::logout))
        .route(
            "/auth/profile",
            routing::put(handlers::user::update_profile),
        )
        .route("/auth/password", routing::put(handlers::change_password))
        .route(
            "/auth/resend-verification",
            routing::post(handlers::resend_verification),
        )
        // Poems
        .route("/poems", routing::post(handlers::poem::create_poem))
        .route("/poems/mine", routing::get(handlers::poem::list_my_poems))
        .route(
            "/poems/{id}",
            routing::put(handlers::poem::update_poem).delete(handlers::poem::delete_poem),
        )
        .route(
            "/poems/{id}/status",
            routing::put(handlers::poem::change_poem_status),
        )
        .route(
            "/poems/{id}/like",
            routing::post(handlers::poem::toggle_like),
        )
        // Comments
        .route(
            "/poems/{id}/comments",
            routing::post(handlers::comment::create_comment),
        )
        .route(
            "/comments/{id}",
            routing::delete(handlers::comment::delete_comment),
        )
        // Author applications
        .route(
            "/applications",
            routing::post(handlers::application::create_application),
        )
        .route(
            "/applications/mine",
            routing::get(handlers::application::get_my_application),
        )
        .route(
            "/applications/{id}",
            routing::get(handlers::application::get_application)
                .put(handlers::application::update_application),
        )
        .route(
            "/applications/{id}/status",
            routing::put(handlers::application::change_application_status),
        )
        // Admin (permission checked in handler)
        .route(
            "/admin/poems",
            routing::get(handlers::admin::list_poems_for_review),
        )
        .route(
            "/admin/applications",
            routing::get(handlers::admin::list_applications),
        )
        .route("/admin/stats", routing::get(handlers::admin::get_stats))
        .route("/admin/users", routing::get(handlers::admin::list_users))
        .route(
            "/admin/users/{id}/role",
            routing::put(handlers::admin::update_user_role),
        )
        .route(
            "/admin/users/{id}/revoke-sessions",
            routing::post(handlers::admin::revoke_user_sessions),
        )
        .route(
            "/admin/users/{id}/password",
            routing::put(handlers::admin::reset_user_password),
        );

    with_optional_rate_limit(router, config, RateLimitGroup::Protected)
}

fn with_optional_rate_limit(
    router: Router,
    config: &RateLimitConfig,
    group: RateLimitGroup,
) -> Router {
    if !config.enabled {
        return router;
    }

    let rule = config.rule(group);
    match GovernorConfigBuilder::default()
        .per_second(rule.per_second)
        .burst_size(rule.burst_size)
        .finish()
    {
        Some(governor_conf) => router.layer(GovernorLayer::new(governor_conf)),
        None => {
            tracing::warn!(?group, "Invalid rate limit rule {:?}, limiter disabled", rule);
            router
        }
    }
}
