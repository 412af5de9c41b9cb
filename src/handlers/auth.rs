use crate::config::auth::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::UserModel;
use crate::permission::{Permission, Role};
use crate::response::ApiResponse;
use crate::services::auth::{AuthService, Registration, TokenPair};
use crate::services::email::EmailService;
use crate::utils::{
    cookie::{
        build_auth_cookie, build_clear_cookie, extract_cookie, ACCESS_TOKEN_COOKIE,
        REFRESH_TOKEN_COOKIE,
    },
    jwt::{
        access_token_expiry_seconds, decode_jwt, is_refresh_token, refresh_token_expiry_seconds,
    },
};
use anyhow::anyhow;
use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Real name (1-50 characters)
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    /// Optional pen name shown on poems (max 50 characters)
    #[validate(length(max = 50))]
    pub pen_name: Option<String>,
    #[validate(email)]
    pub email: String,
    /// Password (min 8 characters)
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The signed-in account, including what its role allows.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub pen_name: Option<String>,
    /// Pen name when set, real name otherwise
    pub display_name: String,
    pub email: String,
    pub bio: Option<String>,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub email_verified: bool,
    pub created_at: String,
}

impl From<UserModel> for UserResponse {
    fn from(user: UserModel) -> Self {
        Self {
            display_name: user.display_name().to_string(),
            id: user.id,
            name: user.name,
            pen_name: user.pen_name,
            email: user.email,
            bio: user.bio,
            permissions: user.role.permissions().to_vec(),
            role: user.role,
            email_verified: user.email_verified,
            created_at: user.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// JWT access token
    pub token: String,
    /// JWT refresh token
    pub refresh_token: String,
    pub user: UserResponse,
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered", body = AuthResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 409, description = "Email already registered", body = AppError),
    ),
    tag = "auth"
)]
pub async fn register(
    Extension(db): Extension<DatabaseConnection>,
    Extension(email_service): Extension<EmailService>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let service = AuthService::new(db);
    let (user, tokens) = service
        .register(
            Registration {
                name: &payload.name,
                pen_name: payload.pen_name.as_deref(),
                email: &payload.email,
                password: &payload.password,
            },
            &email_service,
        )
        .await?;

    let message = if AuthConfig::from_env().require_email_verification {
        "Registration successful. Please check your email to verify your account."
    } else {
        "Registration successful."
    };

    auth_response(user, tokens, Some(message))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = AppError),
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let service = AuthService::new(db);
    let (user, tokens) = service.login(&payload.email, &payload.password).await?;
    auth_response(user, tokens, None)
}

fn auth_response(user: UserModel, tokens: TokenPair, message: Option<&str>) -> AppResult<Response> {
    let body = AuthResponse {
        token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token.clone(),
        user: UserResponse::from(user),
    };
    let mut response = match message {
        Some(message) => ApiResponse::with_message(body, message).into_response(),
        None => ApiResponse::ok(body).into_response(),
    };
    set_auth_cookies(&mut response, &tokens)?;
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "auth"
)]
pub async fn get_current_user(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user = AuthService::new(db).get_user_by_id(auth_user.user_id).await?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    /// New password (min 8 characters)
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[utoipa::path(
    put,
    path = "/api/auth/password",
    security(("jwt_token" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, all sessions signed out", body = String),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "auth"
)]
pub async fn change_password(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    AuthService::new(db)
        .change_password(
            auth_user.user_id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    let mut response = ApiResponse::ok("Password changed successfully").into_response();
    clear_auth_cookies(&mut response)?;
    Ok(response)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = String),
        (status = 400, description = "Invalid or expired token", body = AppError),
    ),
    tag = "auth"
)]
pub async fn verify_email(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<VerifyEmailRequest>,
) -> AppResult<impl IntoResponse> {
    AuthService::new(db).verify_email(&payload.token).await?;
    Ok(ApiResponse::ok("Email verified successfully"))
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-verification",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Verification email sent", body = String),
        (status = 400, description = "Already verified", body = AppError),
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    Extension(db): Extension<DatabaseConnection>,
    Extension(email_service): Extension<EmailService>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    AuthService::new(db)
        .resend_verification(auth_user.user_id, &email_service)
        .await?;
    Ok(ApiResponse::ok("Verification email sent"))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent if the account exists", body = String),
        (status = 400, description = "Validation error", body = AppError),
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    Extension(db): Extension<DatabaseConnection>,
    Extension(email_service): Extension<EmailService>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    AuthService::new(db)
        .forgot_password(&payload.email, &email_service)
        .await?;

    // same answer whether or not the account exists
    Ok(ApiResponse::ok(
        "If an account with that email exists, a password reset link has been sent.",
    ))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    /// New password (min 8 characters)
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = String),
        (status = 400, description = "Validation error or invalid token", body = AppError),
    ),
    tag = "auth"
)]
pub async fn reset_password(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    AuthService::new(db)
        .reset_password(&payload.token, &payload.new_password)
        .await?;

    Ok(ApiResponse::ok("Password has been reset successfully"))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    /// Refresh token; falls back to the `refresh_token` cookie
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
}

fn refresh_token_from(headers: &HeaderMap, payload: Option<Json<RefreshTokenRequest>>) -> Option<String> {
    payload
        .and_then(|Json(body)| body.refresh_token)
        .filter(|t| !t.is_empty())
        .or_else(|| extract_cookie(headers, REFRESH_TOKEN_COOKIE))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = TokenResponse),
        (status = 401, description = "Invalid, expired or revoked refresh token", body = AppError),
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    payload: Option<Json<RefreshTokenRequest>>,
) -> AppResult<impl IntoResponse> {
    let refresh_token = refresh_token_from(&headers, payload).ok_or(AppError::Unauthorized)?;

    let claims = decode_jwt(&refresh_token).map_err(|_| AppError::Unauthorized)?;
    if !is_refresh_token(&claims) {
        return Err(AppError::Unauthorized);
    }
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;

    let tokens = AuthService::new(db)
        .rotate_refresh_token(user_id, &refresh_token)
        .await?;

    let body = TokenResponse {
        token: tokens.access_token.clone(),
        refresh_token: tokens.refresh_token.clone(),
    };
    let mut response = ApiResponse::ok(body).into_response();
    set_auth_cookies(&mut response, &tokens)?;
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    security(("jwt_token" = [])),
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Refresh token revoked and cookies cleared", body = String),
    ),
    tag = "auth"
)]
pub async fn logout(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    _auth_user: AuthUser,
    payload: Option<Json<RefreshTokenRequest>>,
) -> AppResult<impl IntoResponse> {
    if let Some(token) = refresh_token_from(&headers, payload) {
        AuthService::new(db).revoke_refresh_token(&token).await?;
    }

    let mut response = ApiResponse::ok("Logout successful").into_response();
    clear_auth_cookies(&mut response)?;
    Ok(response)
}

fn set_auth_cookies(response: &mut Response, tokens: &TokenPair) -> AppResult<()> {
    append_set_cookie(
        response,
        &build_auth_cookie(
            ACCESS_TOKEN_COOKIE,
            &tokens.access_token,
            access_token_expiry_seconds(),
        ),
    )?;
    append_set_cookie(
        response,
        &build_auth_cookie(
            REFRESH_TOKEN_COOKIE,
            &tokens.refresh_token,
            refresh_token_expiry_seconds(),
        ),
    )
}

fn clear_auth_cookies(response: &mut Response) -> AppResult<()> {
    append_set_cookie(response, &build_clear_cookie(ACCESS_TOKEN_COOKIE))?;
    append_set_cookie(response, &build_clear_cookie(REFRESH_TOKEN_COOKIE))
}

fn append_set_cookie(response: &mut Response, cookie_value: &str) -> AppResult<()> {
    let value = HeaderValue::from_str(cookie_value).map_err(|e| {
        AppError::Internal(anyhow!("Failed to build Set-Cookie header value: {}", e))
    })?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}
