use anyhow::Result;
use std::env;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Seconds; defaults to 15 minutes.
    pub access_token_expiry: u64,
    /// Seconds; defaults to 7 days.
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable must be set"))?;

        if secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least {MIN_SECRET_LEN} characters"
            ));
        }

        let access_token_expiry = env::var("JWT_ACCESS_EXPIRATION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(900);

        let refresh_token_expiry = env::var("JWT_REFRESH_EXPIRATION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(604800);

        Ok(Self {
            secret,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}
