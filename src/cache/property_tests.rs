//! Property-Based Tests for Cache Module
//!
//! Drives the client over the embedded store with generated keys, values and
//! operation sequences.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::block_on;

use crate::cache::{CacheClient, MemoryStore};
use crate::ratelimit::{CacheRateLimiter, RateLimiter};

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,64}"
}

fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,256}"
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: u32,
    tags: Vec<String>,
    scores: HashMap<String, i64>,
}

fn profile_strategy() -> impl Strategy<Value = Profile> {
    (
        valid_value_strategy(),
        any::<u32>(),
        prop::collection::vec("[a-z]{1,8}", 0..5),
        prop::collection::hash_map("[a-z]{1,8}", any::<i64>(), 0..5),
    )
        .prop_map(|(name, age, tags, scores)| Profile {
            name,
            age,
            tags,
            scores,
        })
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // Small key space so operations collide
    let key = "k[0-4]";
    prop_oneof![
        (key, valid_value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn client() -> CacheClient {
    CacheClient::embedded(MemoryStore::new())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Storing a struct and reading it back before expiry yields an equal value.
    #[test]
    fn prop_struct_roundtrip(key in valid_key_strategy(), profile in profile_strategy()) {
        let client = client();
        let read: Profile = block_on(async {
            client.set_struct(&key, &profile, Duration::from_secs(60)).await.unwrap();
            client.read_struct(&key).await.unwrap()
        });
        prop_assert_eq!(read, profile);
    }

    // Keys never written always read as cache_miss, never as another error.
    #[test]
    fn prop_unwritten_key_is_cache_miss(key in valid_key_strategy()) {
        let client = client();
        let err = block_on(client.get(&key)).unwrap_err();
        prop_assert!(err.is_cache_miss());
        prop_assert!(block_on(client.read_struct::<Profile>(&key)).unwrap_err().is_cache_miss());
    }

    // Any operation sequence agrees with a plain map model.
    #[test]
    fn prop_operations_match_model(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let client = client();
        let mut model: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    block_on(client.set(&key, &value, Duration::ZERO)).unwrap();
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    let result = block_on(client.get_string(&key));
                    match model.get(&key) {
                        Some(expected) => prop_assert_eq!(&result.unwrap(), expected),
                        None => prop_assert!(result.unwrap_err().is_cache_miss()),
                    }
                }
                CacheOp::Delete { key } => {
                    let existed = block_on(client.del(&key)).unwrap();
                    prop_assert_eq!(existed, model.remove(&key).is_some());
                }
            }
        }
    }

    // A field written with hset_ex is readable and the key carries the expiry.
    #[test]
    fn prop_hset_ex_then_hget(
        key in valid_key_strategy(),
        field in "[a-z]{1,16}",
        value in valid_value_strategy(),
        ttl_secs in 1u64..3600,
    ) {
        let client = client();
        let (read, ttl) = block_on(async {
            client.hset_ex(&key, &field, &value, Duration::from_secs(ttl_secs)).await.unwrap();
            (client.hget(&key, &field).await.unwrap(), client.ttl(&key).await.unwrap())
        });
        prop_assert_eq!(read, value);
        let ttl = ttl.unwrap();
        prop_assert!(ttl > Duration::ZERO && ttl <= Duration::from_secs(ttl_secs));
    }

    // Within one window, the n-th attempt is allowed iff n <= max_attempts.
    #[test]
    fn prop_rate_limit_counts(
        max_attempts in prop_oneof![Just(i64::MIN), Just(i64::MAX), -2i64..10],
        attempts in 1usize..20,
    ) {
        let limiter = CacheRateLimiter::new(Arc::new(client()));
        for n in 1..=attempts {
            let decision = block_on(limiter.rate_limit("prop", max_attempts, 60)).unwrap();
            let n = n as i64;
            prop_assert_eq!(decision.count, n);
            prop_assert_eq!(decision.allowed, max_attempts > 0 && n <= max_attempts);
            prop_assert_eq!(decision.remaining, max_attempts.saturating_sub(n).max(0));
        }
    }
}
