//! Fixed-window rate limiter backed by the cache client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::CacheClient;
use crate::error::{Result, StructuredError};

/// Key prefix separating rate-limit counters from other cache keys.
pub const DEFAULT_PREFIX: &str = "rate:";

/// Result of a rate limiting decision with metadata for HTTP responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Attempts recorded in the current window, including this one
    pub count: i64,
    /// Attempts left before the limit is hit
    pub remaining: i64,
    /// Time until the window resets
    pub retry_after: Duration,
    /// Whether the request should be allowed
    pub allowed: bool,
}

impl RateLimitDecision {
    /// Splits into `(count, retry_after, allowed)`.
    pub fn into_parts(self) -> (i64, Duration, bool) {
        (self.count, self.retry_after, self.allowed)
    }
}

/// Answers "may this key make another attempt in the current window?".
pub trait RateLimiter: Send + Sync {
    fn rate_limit(
        &self,
        key: &str,
        max_attempts: i64,
        window_seconds: u64,
    ) -> impl Future<Output = Result<RateLimitDecision>> + Send;
}

/// Fixed-window counter stored in the cache.
///
/// Holds no window state of its own, so any number of limiters sharing a
/// backend agree on every key. Cache failures are returned unchanged: the
/// caller decides whether to fail open or closed.
#[derive(Debug, Clone)]
pub struct CacheRateLimiter {
    client: Arc<CacheClient>,
    prefix: String,
}

impl CacheRateLimiter {
    pub fn new(client: Arc<CacheClient>) -> Self {
        Self {
            client,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Builder-style: replace the key prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn window_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl RateLimiter for CacheRateLimiter {
    async fn rate_limit(
        &self,
        key: &str,
        max_attempts: i64,
        window_seconds: u64,
    ) -> Result<RateLimitDecision> {
        if window_seconds == 0 {
            return Err(StructuredError::bad_request("window_seconds must be positive")
                .with_message("Rate limit window must be positive"));
        }
        let window = Duration::from_secs(window_seconds);
        let window_key = self.window_key(key);

        let (count, remaining_window) = self.client.incr_window(&window_key, window).await?;

        let retry_after = match remaining_window {
            Some(remaining) => remaining,
            None => {
                // Counter lost its expiry (written by someone else); restart the clock
                warn!(key = %window_key, count, "Rate limit key had no expiry, re-applying window");
                self.client.expire(&window_key, window).await?;
                window
            }
        };

        // Limits of zero or below deny everything, but the hit is still counted
        let allowed = max_attempts > 0 && count <= max_attempts;
        let decision = RateLimitDecision {
            count,
            remaining: max_attempts.saturating_sub(count).max(0),
            retry_after,
            allowed,
        };

        if allowed {
            debug!(key = %window_key, count, max_attempts, "Rate limit check passed");
        } else {
            debug!(
                key = %window_key,
                count,
                max_attempts,
                retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                "Rate limit exceeded"
            );
        }
        Ok(decision)
    }
}
