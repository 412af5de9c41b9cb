pub mod cookie;
pub mod jwt;
pub mod language;
pub mod password;

pub use jwt::{encode_access_token, encode_refresh_token};
pub use language::{detect_language, Language};
pub use password::{hash_password, verify_password};
