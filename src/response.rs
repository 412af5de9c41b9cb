use axum::{response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

/// Success envelope shared by every JSON endpoint. Errors use `{ "error": ... }`.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::build(data, None)
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self::build(data, Some(message.into()))
    }

    fn build(data: T, message: Option<String>) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let total_pages = match per_page {
            0 => 0,
            n => total.div_ceil(n),
        };
        PaginatedResponse {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PaginationQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationQuery {
    pub fn resolve(&self) -> (u64, u64) {
        resolve_page(self.page, self.per_page)
    }
}

/// `(page, per_page)` with page ≥ 1 and per_page in `1..=MAX_PER_PAGE`.
pub fn resolve_page(page: Option<u64>, per_page: Option<u64>) -> (u64, u64) {
    (
        page.map_or(1, |p| p.max(1)),
        per_page.map_or(DEFAULT_PER_PAGE, |n| n.clamp(1, MAX_PER_PAGE)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(total: u64, per_page: u64) -> u64 {
        PaginatedResponse::<()>::new(vec![], total, 1, per_page).total_pages
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(pages(41, 20), 3);
        assert_eq!(pages(40, 20), 2);
        assert_eq!(pages(1, 100), 1);
    }

    #[test]
    fn empty_results_have_no_pages() {
        assert_eq!(pages(0, 20), 0);
        assert_eq!(pages(7, 0), 0);
    }

    #[test]
    fn query_defaults_and_bounds() {
        assert_eq!(PaginationQuery::default().resolve(), (1, DEFAULT_PER_PAGE));
        assert_eq!(resolve_page(Some(0), Some(0)), (1, 1));
        assert_eq!(resolve_page(Some(4), Some(1_000)), (4, MAX_PER_PAGE));
    }

    #[test]
    fn message_is_omitted_when_absent() {
        let body = serde_json::to_value(ApiResponse::ok(3)).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "data": 3 }));
        let body = serde_json::to_value(ApiResponse::with_message((), "sent")).unwrap();
        assert_eq!(body["message"], "sent");
    }
}
