use anyhow::{Context, Result};
use std::sync::OnceLock;

/// bcrypt work factor, `BCRYPT_COST` (4–31), defaulting to bcrypt's own default.
fn bcrypt_cost() -> u32 {
    static COST: OnceLock<u32> = OnceLock::new();
    *COST.get_or_init(|| {
        std::env::var("BCRYPT_COST")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|c| (4..=31).contains(c))
            .unwrap_or(bcrypt::DEFAULT_COST)
    })
}

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt_cost()).context("Failed to hash password")
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).context("Failed to verify password")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("moonlight_on_the_floor").unwrap();
        assert!(verify_password("moonlight_on_the_floor", &hash).unwrap());
        assert!(!verify_password("frost_on_the_ground", &hash).unwrap());
    }

    #[test]
    fn salts_differ() {
        let a = hash_password("same_password").unwrap();
        let b = hash_password("same_password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("x", "not-a-bcrypt-hash").is_err());
    }
}
