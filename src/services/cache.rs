use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

/// Seconds a published poem stays cached.
pub const POEM_CACHE_TTL_SECS: u64 = 300;

pub fn poem_key(poem_id: i32) -> String {
    format!("poem:{poem_id}")
}

/// JSON values in Redis. Every failure degrades to a cache miss.
#[derive(Clone)]
pub struct CacheService {
    redis: ConnectionManager,
}

impl CacheService {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("Cache read for {key} failed: {e}");
                return None;
            }
        };
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Ok(json) = serde_json::to_string(value) else {
            return;
        };
        let mut conn = self.redis.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, json, ttl_secs).await {
            tracing::debug!("Cache write for {key} failed: {e}");
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let mut conn = self.redis.clone();
        if let Err(e) = conn.del::<_, ()>(key).await {
            tracing::warn!("Cache invalidation for {key} failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poem_keys_are_namespaced() {
        assert_eq!(poem_key(42), "poem:42");
    }
}
