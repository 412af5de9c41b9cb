use crate::error::{AppError, AppResult};
use crate::handlers::poem::AuthorSummary;
use crate::middleware::AuthUser;
use crate::models::{
    author_application::PortfolioItem, ApplicationReviewModel, AuthorApplicationModel, UserModel,
};
use crate::permission::Permission;
use crate::response::ApiResponse;
use crate::services::application::{ApplicationContent, ApplicationService};
use crate::services::email::EmailService;
use crate::workflow::{ApplicationStatus, ReviewAction};
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ApplicationRequest {
    /// Why you want to publish as an author (10-200 characters)
    #[validate(length(min = 10, max = 200))]
    pub statement: String,
    /// Up to 10 sample poems
    #[serde(default)]
    #[validate(length(max = 10))]
    pub portfolio: Vec<PortfolioItem>,
    /// Up to 5 http(s) links
    #[serde(default)]
    #[validate(length(max = 5))]
    pub attachments: Vec<String>,
}

impl From<ApplicationRequest> for ApplicationContent {
    fn from(req: ApplicationRequest) -> Self {
        Self {
            statement: req.statement,
            portfolio: req.portfolio,
            attachments: req.attachments,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangeApplicationStatusRequest {
    pub status: ApplicationStatus,
    /// Reviewer feedback stored with the review entry
    #[validate(length(max = 1000))]
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: i32,
    pub reviewer_id: i32,
    pub action: ReviewAction,
    pub from_status: ApplicationStatus,
    pub to_status: ApplicationStatus,
    pub feedback: Option<String>,
    pub created_at: String,
}

impl From<ApplicationReviewModel> for ReviewResponse {
    fn from(r: ApplicationReviewModel) -> Self {
        Self {
            id: r.id,
            reviewer_id: r.reviewer_id,
            action: r.action,
            from_status: r.from_status,
            to_status: r.to_status,
            feedback: r.feedback,
            created_at: r.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationResponse {
    pub id: i32,
    pub user_id: i32,
    pub statement: String,
    pub portfolio: Vec<PortfolioItem>,
    pub attachments: Vec<String>,
    pub status: ApplicationStatus,
    pub expires_at: String,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicant: Option<AuthorSummary>,
    /// Review history, oldest first
    pub reviews: Vec<ReviewResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl ApplicationResponse {
    pub(crate) fn build(
        application: AuthorApplicationModel,
        reviews: Vec<ApplicationReviewModel>,
        applicant: Option<&UserModel>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            expired: application.is_expired(now),
            applicant: applicant.map(|u| AuthorSummary {
                id: u.id,
                display_name: u.display_name().to_string(),
            }),
            id: application.id,
            user_id: application.user_id,
            statement: application.statement,
            portfolio: application.portfolio.0,
            attachments: application.attachments.0,
            status: application.status,
            expires_at: application.expires_at.to_string(),
            reviews: reviews.into_iter().map(ReviewResponse::from).collect(),
            created_at: application.created_at.to_string(),
            updated_at: application.updated_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusChangeResponse {
    pub application: ApplicationResponse,
    /// Review entry written by this change, if any
    pub review: Option<ReviewResponse>,
}

#[utoipa::path(
    post,
    path = "/api/applications",
    security(("jwt_token" = [])),
    request_body = ApplicationRequest,
    responses(
        (status = 200, description = "Draft application created", body = ApplicationResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 409, description = "An open or approved application already exists", body = AppError),
    ),
    tag = "applications"
)]
pub async fn create_application(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<ApplicationRequest>,
) -> AppResult<impl IntoResponse> {
    auth_user.require(Permission::SubmitApplication)?;
    payload.validate()?;

    let application = ApplicationService::new(db)
        .create(auth_user.user_id, payload.into())
        .await?;
    Ok(ApiResponse::ok(ApplicationResponse::build(
        application,
        vec![],
        None,
    )))
}

#[utoipa::path(
    get,
    path = "/api/applications/mine",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Latest application with its review history, or null", body = ApplicationResponse),
    ),
    tag = "applications"
)]
pub async fn get_my_application(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let latest = ApplicationService::new(db)
        .latest_for_user(auth_user.user_id)
        .await?;
    Ok(ApiResponse::ok(latest.map(|(application, reviews)| {
        ApplicationResponse::build(application, reviews, None)
    })))
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application with review history", body = ApplicationResponse),
        (status = 403, description = "Neither applicant nor reviewer", body = AppError),
        (status = 404, description = "Application not found", body = AppError),
    ),
    tag = "applications"
)]
pub async fn get_application(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let (application, reviews) = ApplicationService::new(db).get_for(id, &auth_user).await?;
    Ok(ApiResponse::ok(ApplicationResponse::build(
        application,
        reviews,
        None,
    )))
}

#[utoipa::path(
    put,
    path = "/api/applications/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Application ID")),
    request_body = ApplicationRequest,
    responses(
        (status = 200, description = "Application updated", body = ApplicationResponse),
        (status = 403, description = "Not the applicant", body = AppError),
        (status = 409, description = "Application is no longer editable", body = AppError),
    ),
    tag = "applications"
)]
pub async fn update_application(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<ApplicationRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let service = ApplicationService::new(db);
    let application = service
        .update_content(id, auth_user.user_id, payload.into())
        .await?;
    let reviews = service.reviews_for(id).await?;
    Ok(ApiResponse::ok(ApplicationResponse::build(
        application,
        reviews,
        None,
    )))
}

#[utoipa::path(
    put,
    path = "/api/applications/{id}/status",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Application ID")),
    request_body = ChangeApplicationStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = StatusChangeResponse),
        (status = 400, description = "Application expired", body = AppError),
        (status = 403, description = "Caller may not take this transition", body = AppError),
        (status = 409, description = "Transition not allowed or concurrent change", body = AppError),
    ),
    tag = "applications"
)]
pub async fn change_application_status(
    Extension(db): Extension<DatabaseConnection>,
    Extension(email_service): Extension<EmailService>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<ChangeApplicationStatusRequest>,
) -> AppResult<impl IntoResponse> {
    payload.validate()?;

    let service = ApplicationService::new(db);
    let (application, review) = service
        .change_status(
            id,
            &auth_user,
            payload.status,
            payload.feedback.as_deref(),
            &email_service,
        )
        .await?;
    let reviews = service.reviews_for(id).await?;

    Ok(ApiResponse::ok(StatusChangeResponse {
        application: ApplicationResponse::build(application, reviews, None),
        review: review.map(ReviewResponse::from),
    }))
}
