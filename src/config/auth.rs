use super::parse_bool_env;
use std::env;

/// Days an author application stays valid after it is created.
const DEFAULT_APPLICATION_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct AuthConfig {
    pub require_email_verification: bool,
    pub application_ttl_days: i64,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let require_email_verification = parse_bool_env("REQUIRE_EMAIL_VERIFICATION", false);

        let application_ttl_days = env::var("APPLICATION_TTL_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|days: &i64| *days > 0)
            .unwrap_or(DEFAULT_APPLICATION_TTL_DAYS);

        Self {
            require_email_verification,
            application_ttl_days,
        }
    }
}
