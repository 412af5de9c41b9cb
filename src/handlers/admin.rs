use crate::error::{AppError, AppResult};
use crate::handlers::application::ApplicationResponse;
use crate::handlers::poem::{poem_responses, PoemResponse};
use crate::middleware::AuthUser;
use crate::models::UserModel;
use crate::permission::{Permission, Role};
use crate::response::{resolve_page, ApiResponse, PaginatedResponse};
use crate::services::admin::AdminService;
use crate::services::application::ApplicationService;
use crate::services::poem::PoemService;
use crate::workflow::{ApplicationStatus, PoemStatus};
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdminResetPasswordRequest {
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PoemQueueQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Defaults to `under_review`
    pub status: Option<PoemStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ApplicationQueueQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// All statuses when omitted
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_users: u64,
    pub users_today: u64,
    pub draft_poems: u64,
    pub poems_under_review: u64,
    pub published_poems: u64,
    pub total_comments: u64,
    /// Applications in `submitted` or `under_review`
    pub pending_applications: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserResponse {
    pub id: i32,
    pub name: String,
    pub pen_name: Option<String>,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: String,
}

impl From<UserModel> for AdminUserResponse {
    fn from(u: UserModel) -> Self {
        Self {
            id: u.id,
            name: u.name,
            pen_name: u.pen_name,
            email: u.email,
            role: u.role,
            email_verified: u.email_verified,
            created_at: u.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeSessionsResponse {
    pub revoked: u64,
}

#[utoipa::path(
    get,
    path = "/api/admin/poems",
    security(("jwt_token" = [])),
    params(PoemQueueQuery),
    responses(
        (status = 200, description = "Poems in the requested status, oldest first", body = PaginatedResponse<PoemResponse>),
        (status = 403, description = "Requires review_poems", body = AppError),
    ),
    tag = "admin"
)]
pub async fn list_poems_for_review(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Query(query): Query<PoemQueueQuery>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::ReviewPoems)?;

    let (page, per_page) = resolve_page(query.page, query.per_page);
    let status = query.status.unwrap_or(PoemStatus::UnderReview);
    let service = PoemService::new(db);
    let (poems, total) = service.list_by_status(status, page, per_page).await?;
    let items = poem_responses(&service, poems).await?;
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/admin/applications",
    security(("jwt_token" = [])),
    params(ApplicationQueueQuery),
    responses(
        (status = 200, description = "Author applications, oldest first", body = PaginatedResponse<ApplicationResponse>),
        (status = 403, description = "Requires review_applications", body = AppError),
    ),
    tag = "admin"
)]
pub async fn list_applications(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Query(query): Query<ApplicationQueueQuery>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::ReviewApplications)?;

    let (page, per_page) = resolve_page(query.page, query.per_page);
    let (rows, total) = ApplicationService::new(db)
        .list(query.status, page, per_page)
        .await?;
    let items = rows
        .into_iter()
        .map(|(application, applicant)| {
            ApplicationResponse::build(application, vec![], applicant.as_ref())
        })
        .collect();
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Platform statistics", body = StatsResponse),
        (status = 403, description = "Requires view_stats", body = AppError),
    ),
    tag = "admin"
)]
pub async fn get_stats(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::ViewStats)?;

    let stats = AdminService::new(db).get_stats().await?;
    Ok(ApiResponse::ok(StatsResponse {
        total_users: stats.total_users,
        users_today: stats.users_today,
        draft_poems: stats.draft_poems,
        poems_under_review: stats.poems_under_review,
        published_poems: stats.published_poems,
        total_comments: stats.total_comments,
        pending_applications: stats.pending_applications,
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    security(("jwt_token" = [])),
    params(UserListQuery),
    responses(
        (status = 200, description = "Users, newest first", body = PaginatedResponse<AdminUserResponse>),
        (status = 403, description = "Requires list_users", body = AppError),
    ),
    tag = "admin"
)]
pub async fn list_users(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Query(query): Query<UserListQuery>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::ListUsers)?;

    let (page, per_page) = resolve_page(query.page, query.per_page);
    let (users, total) = AdminService::new(db)
        .list_users(query.role, page, per_page)
        .await?;
    let items = users.into_iter().map(AdminUserResponse::from).collect();
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = AdminUserResponse),
        (status = 400, description = "Cannot change your own role", body = AppError),
        (status = 403, description = "Requires manage_roles", body = AppError),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn update_user_role(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::ManageRoles)?;

    let user = AdminService::new(db)
        .update_user_role(&auth_user, id, payload.role)
        .await?;
    Ok(ApiResponse::ok(AdminUserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/revoke-sessions",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "All refresh tokens of the user revoked", body = RevokeSessionsResponse),
        (status = 403, description = "Requires manage_user_security", body = AppError),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn revoke_user_sessions(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::ManageUserSecurity)?;

    let revoked = AdminService::new(db).revoke_sessions(&auth_user, id).await?;
    Ok(ApiResponse::ok(RevokeSessionsResponse { revoked }))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/password",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = AdminResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced and sessions revoked", body = String),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Requires manage_user_security", body = AppError),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn reset_user_password(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<AdminResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::ManageUserSecurity)?;
    payload.validate()?;

    AdminService::new(db)
        .reset_user_password(&auth_user, id, &payload.new_password)
        .await?;
    Ok(ApiResponse::ok("Password reset; the user has been signed out"))
}
