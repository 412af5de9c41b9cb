use crate::error::{AppError, AppResult};
use crate::handlers::auth::UserResponse;
use crate::middleware::AuthUser;
use crate::permission::Role;
use crate::response::ApiResponse;
use crate::services::user::{ProfileUpdate, UserService};
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// What anyone may see about a user.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProfileResponse {
    pub id: i32,
    pub name: String,
    pub pen_name: Option<String>,
    pub display_name: String,
    pub bio: Option<String>,
    pub role: Role,
    pub published_poems: u64,
    pub created_at: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    /// Empty string clears the pen name
    #[validate(length(max = 50))]
    pub pen_name: Option<String>,
    /// Empty string clears the bio
    #[validate(length(max = 500))]
    pub bio: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfileResponse),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "users"
)]
pub async fn get_user_profile(
    Extension(db): Extension<DatabaseConnection>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let (user, published_poems) = UserService::new(db).get_public_profile(id).await?;
    Ok(ApiResponse::ok(PublicProfileResponse {
        display_name: user.display_name().to_string(),
        id: user.id,
        name: user.name,
        pen_name: user.pen_name,
        bio: user.bio,
        role: user.role,
        published_poems,
        created_at: user.created_at.to_string(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/auth/profile",
    security(("jwt_token" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error", body = AppError),
    ),
    tag = "auth"
)]
pub async fn update_profile(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let updated = UserService::new(db)
        .update_profile(
            auth_user.user_id,
            ProfileUpdate {
                name: payload.name,
                pen_name: payload.pen_name,
                bio: payload.bio,
            },
        )
        .await?;
    Ok(ApiResponse::ok(UserResponse::from(updated)))
}
