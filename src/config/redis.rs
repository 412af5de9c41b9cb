use anyhow::Context;
use redis::aio::ConnectionManager;
use std::env;
use tokio::time::{timeout, Duration};

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub url: String,
    pub connect_timeout: Duration,
}

impl RedisConfig {
    pub fn from_env() -> Self {
        let url = env::var("REDIS_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
        let secs = env::var("REDIS_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|s: &u64| *s > 0)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

        Self {
            url,
            connect_timeout: Duration::from_secs(secs),
        }
    }
}

/// Connect the poem cache. Callers treat an error as "run without cache".
pub async fn get_redis() -> anyhow::Result<ConnectionManager> {
    let config = RedisConfig::from_env();
    let client = redis::Client::open(config.url.as_str())
        .with_context(|| format!("Invalid REDIS_URL '{}'", config.url))?;

    timeout(config.connect_timeout, ConnectionManager::new(client))
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "Redis did not answer within {}s",
                config.connect_timeout.as_secs()
            )
        })?
        .context("Redis connection failed")
}
