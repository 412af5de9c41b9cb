use crate::workflow::WorkflowError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl utoipa::ToSchema for AppError {
    fn name() -> std::borrow::Cow<'static, str> {
        "ErrorResponse".into()
    }
}

impl utoipa::PartialSchema for AppError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        ErrorResponse::schema()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Workflow(WorkflowError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            AppError::Workflow(WorkflowError::NotPermitted { .. }) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::Jwt(e) => {
                tracing::debug!("JWT error: {:?}", e);
                "Invalid token".to_string()
            }
            AppError::NotFound => "Resource not found".to_string(),
            AppError::Forbidden => "Forbidden".to_string(),
            AppError::Validation(msg) | AppError::Conflict(msg) => msg,
            AppError::Workflow(e) => {
                tracing::info!("Rejected status change: {e}");
                e.to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "Internal server error".to_string()
            }
        };

        let body = json!({
            "error": error_message,
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Role;
    use crate::workflow::EntityKind;

    #[test]
    fn invalid_transition_is_conflict() {
        let err = AppError::from(WorkflowError::InvalidTransition {
            kind: EntityKind::Application,
            from: "approved",
            to: "submitted",
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("'approved'"));
    }

    #[test]
    fn not_permitted_is_forbidden() {
        let err = AppError::from(WorkflowError::NotPermitted {
            kind: EntityKind::Poem,
            from: "under_review",
            to: "published",
            role: Role::User,
        });
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = AppError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
