pub mod admin;
pub mod application;
pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod comment;
pub mod email;
pub mod poem;
pub mod user;
