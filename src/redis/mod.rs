//! Redis counter backend.
//!
//! [`RedisAtomicCounter`] runs each counter operation as one Lua script, so
//! every process talking to the same Redis shares the same counters.
//!
//! # Data model
//!
//! One string key per counter, `<key_prefix><caller_key>`, holding the failure
//! count as an integer. The key's TTL is the window: it is installed by the
//! first failure and never extended by later ones.
//!
//! # Examples
//!
//! ```ignore
//! use failgate::{FailgateRedisClient, FailureLimiter, FailureLimiterOptions};
//!
//! let client = redis::Client::open("redis://127.0.0.1:6379/")?;
//! let client = FailgateRedisClient::from_client(client, 4).await?;
//!
//! let limiter = FailureLimiter::redis(client, FailureLimiterOptions::default());
//! let verdict = limiter.check("user_123", false).await?;
//! ```

mod common;
pub use common::*;

mod redis_atomic_counter;
pub use redis_atomic_counter::*;
