use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{PoemCommentModel, UserModel};
use crate::permission::Permission;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::comment::CommentService;
use crate::services::poem::PoemService;
use crate::services::user::UserService;
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    /// Comment text (1-1000 characters)
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    pub poem_id: i32,
    pub user_id: i32,
    pub author_name: String,
    pub content: String,
    pub created_at: String,
}

impl CommentResponse {
    fn build(comment: PoemCommentModel, author: Option<&UserModel>) -> Self {
        Self {
            author_name: author
                .map(|a| a.display_name().to_string())
                .unwrap_or_default(),
            id: comment.id,
            poem_id: comment.poem_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: comment.created_at.to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/poems/{id}/comments",
    params(
        ("id" = i32, Path, description = "Poem ID"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Comments, oldest first", body = PaginatedResponse<CommentResponse>),
        (status = 404, description = "Poem not found or not published", body = AppError),
    ),
    tag = "comments"
)]
pub async fn list_comments(
    Extension(db): Extension<DatabaseConnection>,
    Path(poem_id): Path<i32>,
    Query(query): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    PoemService::new(db.clone()).get_visible(poem_id, None).await?;

    let (page, per_page) = query.resolve();
    let (rows, total) = CommentService::new(db)
        .list_by_poem(poem_id, page, per_page)
        .await?;
    let items = rows
        .into_iter()
        .map(|(comment, author)| CommentResponse::build(comment, author.as_ref()))
        .collect();
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    post,
    path = "/api/poems/{id}/comments",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Poem ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Comment added", body = CommentResponse),
        (status = 400, description = "Validation error or poem not published", body = AppError),
        (status = 404, description = "Poem not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn create_comment(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(poem_id): Path<i32>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::Interact)?;
    payload.validate()?;

    PoemService::new(db.clone())
        .get_interactable(poem_id, &auth_user)
        .await?;

    let service = CommentService::new(db.clone());
    let comment = service
        .create(poem_id, auth_user.user_id, &payload.content)
        .await?;
    let author = UserService::new(db)
        .get_by_id(auth_user.user_id)
        .await?;
    Ok(ApiResponse::ok(CommentResponse::build(comment, Some(&author))))
}

#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted", body = String),
        (status = 403, description = "Neither the author nor a moderator", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    CommentService::new(db).delete(id, &auth_user).await?;
    Ok(ApiResponse::ok("Comment deleted"))
}
