//! Rate Limiting Module
//!
//! Fixed-window counters built on the cache client's atomic
//! increment-with-expiry primitive.

mod limiter;

pub use limiter::{CacheRateLimiter, RateLimitDecision, RateLimiter, DEFAULT_PREFIX};
