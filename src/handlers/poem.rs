use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::models::{PoemModel, UserModel};
use crate::permission::Permission;
use crate::response::{resolve_page, ApiResponse, PaginatedResponse};
use crate::services::cache::CacheService;
use crate::services::poem::{NewPoem, PoemEdit, PoemFilter, PoemService, PoemStats};
use crate::utils::Language;
use crate::workflow::PoemStatus;
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorSummary {
    pub id: i32,
    pub display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PoemResponse {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub status: PoemStatus,
    pub language: Language,
    pub tags: Vec<String>,
    pub author: AuthorSummary,
    pub like_count: u64,
    pub comment_count: u64,
    /// Whether the caller likes this poem; absent for anonymous callers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    pub created_at: String,
    pub updated_at: String,
}

impl PoemResponse {
    fn build(poem: PoemModel, author: Option<&UserModel>, stats: PoemStats) -> Self {
        Self {
            author: AuthorSummary {
                id: poem.author_id,
                display_name: author
                    .map(|a| a.display_name().to_string())
                    .unwrap_or_default(),
            },
            id: poem.id,
            title: poem.title,
            content: poem.content,
            status: poem.status,
            language: poem.language,
            tags: poem.tags.0,
            like_count: stats.likes,
            comment_count: stats.comments,
            liked: None,
            created_at: poem.created_at.to_string(),
            updated_at: poem.updated_at.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPoemsQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// `en` or `zh`
    pub language: Option<Language>,
    /// Only poems carrying this tag
    pub tag: Option<String>,
    pub author_id: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MyPoemsQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<PoemStatus>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePoemRequest {
    /// Title (1-100 characters)
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    /// Poem text (1-5000 characters)
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Detected from the content when omitted
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePoemRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePoemStatusRequest {
    pub status: PoemStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: u64,
}

fn make_poem_service(db: DatabaseConnection, cache: Option<CacheService>) -> PoemService {
    let service = PoemService::new(db);
    match cache {
        Some(c) => service.with_cache(c),
        None => service,
    }
}

/// Attach authors and counters to a page of poems.
pub(crate) async fn poem_responses(
    service: &PoemService,
    poems: Vec<PoemModel>,
) -> AppResult<Vec<PoemResponse>> {
    let ids: Vec<i32> = poems.iter().map(|p| p.id).collect();
    let authors: HashMap<i32, UserModel> = service.authors_for(&poems).await?;
    let stats = service.stats_for(&ids).await?;
    Ok(poems
        .into_iter()
        .map(|poem| {
            let author = authors.get(&poem.author_id);
            let counts = stats.get(&poem.id).copied().unwrap_or_default();
            PoemResponse::build(poem, author, counts)
        })
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/poems",
    params(ListPoemsQuery),
    responses(
        (status = 200, description = "Published poems, newest first", body = PaginatedResponse<PoemResponse>),
    ),
    tag = "poems"
)]
pub async fn list_poems(
    Extension(db): Extension<DatabaseConnection>,
    Query(query): Query<ListPoemsQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = resolve_page(query.page, query.per_page);
    let filter = PoemFilter {
        language: query.language,
        tag: query.tag,
        author_id: query.author_id,
    };

    let service = PoemService::new(db);
    let (poems, total) = service.list_published(&filter, page, per_page).await?;
    let items = poem_responses(&service, poems).await?;
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/poems/{id}",
    params(("id" = i32, Path, description = "Poem ID")),
    responses(
        (status = 200, description = "Poem", body = PoemResponse),
        (status = 404, description = "Missing, or not visible to the caller", body = AppError),
    ),
    tag = "poems"
)]
pub async fn get_poem(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = make_poem_service(db, cache.map(|c| c.0));
    let poem = service.get_visible(id, viewer.as_ref()).await?;

    let liked = match viewer {
        Some(v) => Some(service.has_liked(id, v.user_id).await?),
        None => None,
    };
    let mut response = poem_responses(&service, vec![poem])
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    response.liked = liked;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    get,
    path = "/api/poems/mine",
    security(("jwt_token" = [])),
    params(MyPoemsQuery),
    responses(
        (status = 200, description = "The caller's poems in every status", body = PaginatedResponse<PoemResponse>),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "poems"
)]
pub async fn list_my_poems(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Query(query): Query<MyPoemsQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = resolve_page(query.page, query.per_page);
    let service = PoemService::new(db);
    let (poems, total) = service
        .list_by_author(auth_user.user_id, query.status, page, per_page)
        .await?;
    let items = poem_responses(&service, poems).await?;
    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    post,
    path = "/api/poems",
    security(("jwt_token" = [])),
    request_body = CreatePoemRequest,
    responses(
        (status = 200, description = "Draft created", body = PoemResponse),
        (status = 400, description = "Validation error", body = AppError),
    ),
    tag = "poems"
)]
pub async fn create_poem(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<CreatePoemRequest>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::CreatePoem)?;
    payload.validate()?;

    let service = PoemService::new(db);
    let poem = service
        .create(
            auth_user.user_id,
            NewPoem {
                title: payload.title,
                content: payload.content,
                tags: payload.tags,
                language: payload.language,
            },
        )
        .await?;
    let response = poem_responses(&service, vec![poem])
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    put,
    path = "/api/poems/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Poem ID")),
    request_body = UpdatePoemRequest,
    responses(
        (status = 200, description = "Poem updated", body = PoemResponse),
        (status = 403, description = "Not the author", body = AppError),
        (status = 409, description = "Poem is not a draft", body = AppError),
    ),
    tag = "poems"
)]
pub async fn update_poem(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePoemRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let service = make_poem_service(db, cache.map(|c| c.0));
    let poem = service
        .update(
            id,
            &auth_user,
            PoemEdit {
                title: payload.title,
                content: payload.content,
                tags: payload.tags,
                language: payload.language,
            },
        )
        .await?;
    let response = poem_responses(&service, vec![poem])
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    delete,
    path = "/api/poems/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Poem ID")),
    responses(
        (status = 200, description = "Poem deleted", body = String),
        (status = 403, description = "Neither author nor allowed to delete any poem", body = AppError),
        (status = 404, description = "Poem not found", body = AppError),
    ),
    tag = "poems"
)]
pub async fn delete_poem(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    make_poem_service(db, cache.map(|c| c.0))
        .delete(id, &auth_user)
        .await?;
    Ok(ApiResponse::ok("Poem deleted"))
}

#[utoipa::path(
    put,
    path = "/api/poems/{id}/status",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Poem ID")),
    request_body = ChangePoemStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = PoemResponse),
        (status = 403, description = "Caller may not take this transition", body = AppError),
        (status = 409, description = "Transition not allowed from the current status", body = AppError),
    ),
    tag = "poems"
)]
pub async fn change_poem_status(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<ChangePoemStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let service = make_poem_service(db, cache.map(|c| c.0));
    let poem = service.change_status(id, &auth_user, payload.status).await?;
    let response = poem_responses(&service, vec![poem])
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    post,
    path = "/api/poems/{id}/like",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Poem ID")),
    responses(
        (status = 200, description = "Like toggled", body = LikeResponse),
        (status = 400, description = "Poem is not published", body = AppError),
        (status = 404, description = "Poem not found", body = AppError),
    ),
    tag = "poems"
)]
pub async fn toggle_like(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::Interact)?;
    let (liked, like_count) = PoemService::new(db).toggle_like(id, &auth_user).await?;
    Ok(ApiResponse::ok(LikeResponse { liked, like_count }))
}
