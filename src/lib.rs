pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod permission;
pub mod response;
pub mod routes;
pub mod services;
pub mod utils;
pub mod workflow;

pub use error::{AppError, AppResult};
pub use middleware::auth::AuthUser;
pub use permission::{Permission, Role};
pub use response::{ApiResponse, PaginatedResponse, PaginationQuery};
pub use workflow::{ApplicationStatus, PoemStatus};
