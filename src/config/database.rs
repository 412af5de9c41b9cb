use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PoolSize {
    max: u32,
    min: u32,
}

impl PoolSize {
    fn from_env() -> Self {
        let read = |name: &str, default: u32| {
            env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        Self::clamped(read("DB_MAX_CONNECTIONS", 10), read("DB_MIN_CONNECTIONS", 2))
    }

    /// At least one connection, and never more idle ones than the cap.
    fn clamped(max: u32, min: u32) -> Self {
        let max = max.max(1);
        Self {
            max,
            min: min.min(max),
        }
    }
}

pub async fn get_database() -> anyhow::Result<DatabaseConnection> {
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PoolSize::from_env();
    tracing::debug!(max = pool.max, min = pool.min, "Database pool size");

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(pool.max)
        .min_connections(pool.min)
        .connect_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true);

    Database::connect(options)
        .await
        .context("Failed to connect to database")
}

#[cfg(test)]
mod tests {
    use super::PoolSize;

    #[test]
    fn pool_size_is_clamped() {
        assert_eq!(PoolSize::clamped(0, 0), PoolSize { max: 1, min: 0 });
        assert_eq!(PoolSize::clamped(4, 9), PoolSize { max: 4, min: 4 });
        assert_eq!(PoolSize::clamped(10, 2), PoolSize { max: 10, min: 2 });
    }
}
