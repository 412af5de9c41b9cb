pub mod admin;
pub mod application;
pub mod auth;
pub mod comment;
pub mod poem;
pub mod user;

pub use auth::*;
