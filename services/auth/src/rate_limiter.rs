//! Login rate limiter for preventing brute force attacks
//!
//! Failures are counted per key (the normalized login email). Once a key
//! reaches `max_attempts` failures inside `window_seconds` it is banned for
//! `ban_duration_seconds`. A successful login clears the key.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of failed attempts allowed
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,        // 5 minutes
            ban_duration_seconds: 3600, // 1 hour
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    failures: u32,
    window_start: Instant,
    ban_expires: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// False while the key is banned
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let Some(ban_expires) = entries.get(key).map(|entry| entry.ban_expires) else {
            return true;
        };

        match ban_expires {
            Some(ban_expires) if now < ban_expires => false,
            Some(_) => {
                entries.remove(key);
                true
            }
            None => true,
        }
    }

    /// Count a failed attempt, banning the key once the limit is reached
    pub async fn record_failure(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);

        // Drop keys whose window lapsed without a live ban
        entries.retain(|_, entry| match entry.ban_expires {
            Some(ban_expires) => now < ban_expires,
            None => now.duration_since(entry.window_start) < window,
        });

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            failures: 0,
            window_start: now,
            ban_expires: None,
        });

        if now.duration_since(entry.window_start) >= window {
            entry.failures = 0;
            entry.window_start = now;
        }

        entry.failures += 1;
        if entry.failures >= self.config.max_attempts && entry.ban_expires.is_none() {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                key = %key,
                ban_seconds = self.config.ban_duration_seconds,
                "too many failed logins, key banned"
            );
        }
    }

    /// Forget all failures for the key
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, ban_duration_seconds: u64) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts,
            window_seconds: 300,
            ban_duration_seconds,
        })
    }

    #[tokio::test]
    async fn bans_after_max_failures() {
        let limiter = limiter(3, 3600);
        for _ in 0..2 {
            limiter.record_failure("a@example.com").await;
        }
        assert!(limiter.is_allowed("a@example.com").await);

        limiter.record_failure("a@example.com").await;
        assert!(!limiter.is_allowed("a@example.com").await);
        assert!(limiter.is_allowed("b@example.com").await);
    }

    #[tokio::test]
    async fn reset_clears_failures() {
        let limiter = limiter(2, 3600);
        limiter.record_failure("a@example.com").await;
        limiter.reset("a@example.com").await;
        limiter.record_failure("a@example.com").await;
        assert!(limiter.is_allowed("a@example.com").await);
    }

    #[tokio::test]
    async fn lapsed_windows_are_pruned() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 5,
            window_seconds: 0,
            ban_duration_seconds: 3600,
        });
        for n in 0..10 {
            limiter.record_failure(&format!("user{}@example.com", n)).await;
        }
        assert_eq!(limiter.tracked_keys().await, 1);
    }

    #[tokio::test]
    async fn live_bans_survive_pruning() {
        let limiter = limiter(1, 3600);
        limiter.record_failure("a@example.com").await;
        limiter.record_failure("b@example.com").await;
        assert!(!limiter.is_allowed("a@example.com").await);
        assert!(!limiter.is_allowed("b@example.com").await);
    }

    #[tokio::test]
    async fn expired_ban_is_lifted() {
        let limiter = limiter(1, 0);
        limiter.record_failure("a@example.com").await;
        assert!(limiter.is_allowed("a@example.com").await);
    }
}
