use super::parse_bool_env;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub per_second: u64,
    pub burst_size: u32,
}

impl RateLimitRule {
    const fn new(per_second: u64, burst_size: u32) -> Self {
        Self {
            per_second,
            burst_size,
        }
    }
}

/// Route groups that get their own limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitGroup {
    Auth,
    PublicRead,
    Protected,
}

impl RateLimitGroup {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auth" => Some(Self::Auth),
            "public" | "public_read" | "public-read" => Some(Self::PublicRead),
            "protected" => Some(Self::Protected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth: RateLimitRule,
    pub public_read: RateLimitRule,
    pub protected: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: RateLimitRule::new(5, 10),
            public_read: RateLimitRule::new(30, 60),
            protected: RateLimitRule::new(10, 20),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.enabled = parse_bool_env("RATE_LIMIT_ENABLED", cfg.enabled);

        if let Ok(raw) = env::var("RATE_LIMIT_CONFIG") {
            match parse_overrides(&raw) {
                Ok(overrides) => cfg.apply(&overrides),
                Err(err) => {
                    tracing::warn!("Invalid RATE_LIMIT_CONFIG '{}': {}", raw, err);
                }
            }
        }

        cfg
    }

    pub fn rule(&self, group: RateLimitGroup) -> RateLimitRule {
        match group {
            RateLimitGroup::Auth => self.auth,
            RateLimitGroup::PublicRead => self.public_read,
            RateLimitGroup::Protected => self.protected,
        }
    }

    fn apply(&mut self, overrides: &[(Option<RateLimitGroup>, RateLimitRule)]) {
        for &(group, rule) in overrides {
            match group {
                None => {
                    self.auth = rule;
                    self.public_read = rule;
                    self.protected = rule;
                }
                Some(RateLimitGroup::Auth) => self.auth = rule,
                Some(RateLimitGroup::PublicRead) => self.public_read = rule,
                Some(RateLimitGroup::Protected) => self.protected = rule,
            }
        }
    }
}

/// Parse `"10:20"` (every group) or `"auth=5:10,public=30:60,protected=10:20"`.
/// A `None` group means the rule applies everywhere.
fn parse_overrides(raw: &str) -> Result<Vec<(Option<RateLimitGroup>, RateLimitRule)>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty value".to_string());
    }

    if !trimmed.contains('=') {
        return Ok(vec![(None, parse_rule(trimmed)?)]);
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (name, raw_rule) = item
                .split_once('=')
                .ok_or_else(|| format!("invalid item '{}', expected name=per:burst", item))?;
            let group = RateLimitGroup::parse(name).ok_or_else(|| {
                format!(
                    "unknown group '{}', expected auth/public/protected",
                    name.trim()
                )
            })?;
            Ok((Some(group), parse_rule(raw_rule.trim())?))
        })
        .collect()
}

fn parse_rule(raw: &str) -> Result<RateLimitRule, String> {
    let (per_second_raw, burst_raw) = raw
        .split_once(':')
        .ok_or_else(|| format!("invalid rule '{}', expected per:burst", raw))?;

    let per_second: u64 = per_second_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid per_second '{}'", per_second_raw.trim()))?;
    let burst_size: u32 = burst_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid burst_size '{}'", burst_raw.trim()))?;

    if per_second == 0 || burst_size == 0 {
        return Err("per_second and burst_size must be > 0".to_string());
    }

    Ok(RateLimitRule::new(per_second, burst_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_rule_applies_to_every_group() {
        let mut cfg = RateLimitConfig::default();
        cfg.apply(&parse_overrides("12:24").unwrap());
        for group in [
            RateLimitGroup::Auth,
            RateLimitGroup::PublicRead,
            RateLimitGroup::Protected,
        ] {
            assert_eq!(cfg.rule(group), RateLimitRule::new(12, 24));
        }
    }

    #[test]
    fn grouped_rules_override_individually() {
        let mut cfg = RateLimitConfig::default();
        cfg.apply(&parse_overrides("auth=1:2, public-read=3:4").unwrap());
        assert_eq!(cfg.auth, RateLimitRule::new(1, 2));
        assert_eq!(cfg.public_read, RateLimitRule::new(3, 4));
        assert_eq!(cfg.protected, RateLimitConfig::default().protected);
    }

    #[test]
    fn rejects_unknown_group() {
        let err = parse_overrides("admin=1:2").unwrap_err();
        assert!(err.contains("unknown group"));
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(parse_overrides("0:10").is_err());
        assert!(parse_overrides("auth=abc").unwrap_err().contains("invalid rule"));
    }
}
