use crate::config::jwt::JwtConfig;
use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

static JWT_CONFIG: OnceLock<JwtConfig> = OnceLock::new();

/// Initialize JWT config. Must be called once at startup.
pub fn init_jwt_config(config: JwtConfig) -> Result<()> {
    JWT_CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("JWT config already initialized"))?;
    Ok(())
}

fn get_config() -> Result<&'static JwtConfig> {
    JWT_CONFIG
        .get()
        .ok_or_else(|| anyhow::anyhow!("JWT config not initialized"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: usize,
    pub iat: usize,
    /// Unique per token so two tokens issued in the same second still differ.
    pub jti: String,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }
}

fn encode_token(user_id: i32, token_type: TokenType) -> Result<String> {
    let config = get_config()?;
    let now = chrono::Utc::now().timestamp() as usize;
    let ttl = match token_type {
        TokenType::Access => config.access_token_expiry,
        TokenType::Refresh => config.refresh_token_expiry,
    };
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + ttl as usize,
        iat: now,
        jti: uuid::Uuid::new_v4().to_string(),
        token_type,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("Failed to encode {:?} token: {}", token_type, e))
}

pub fn encode_access_token(user_id: i32) -> Result<String> {
    encode_token(user_id, TokenType::Access)
}

pub fn encode_refresh_token(user_id: i32) -> Result<String> {
    encode_token(user_id, TokenType::Refresh)
}

pub fn decode_jwt(token: &str) -> Result<Claims> {
    let config = get_config()?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| anyhow::anyhow!("Failed to decode JWT: {}", e))
}

pub fn is_refresh_token(claims: &Claims) -> bool {
    claims.token_type == TokenType::Refresh
}

pub fn is_access_token(claims: &Claims) -> bool {
    claims.token_type == TokenType::Access
}

/// Refresh tokens are stored as a SHA-256 hex digest, never in plain text.
pub fn hash_refresh_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn access_token_expiry_seconds() -> u64 {
    get_config().map(|c| c.access_token_expiry).unwrap_or(900)
}

pub fn refresh_token_expiry_seconds() -> u64 {
    get_config().map(|c| c.refresh_token_expiry).unwrap_or(604800)
}
