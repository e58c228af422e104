//! In-process counter backend.
//!
//! [`LocalAtomicCounter`] keeps failure counters inside the current process
//! using a [`DashMap`](dashmap::DashMap). It follows the same protocol as the
//! Redis scripts, so a [`FailureLimiter`](crate::FailureLimiter) behaves the
//! same on either backend.
//!
//! # When to Use
//!
//! ✅ **Use the local counter when:**
//! - Single-process application
//! - Tests and development without a Redis server
//!
//! ❌ **Don't use it when:**
//! - Multiple application instances must share the same counters
//! - Counters must survive process restarts
//!
//! # Examples
//!
//! ```no_run
//! use failgate::{FailureLimiter, FailureLimiterOptions, Verdict};
//!
//! # async fn run() -> Result<(), failgate::FailgateError> {
//! let limiter = FailureLimiter::local(FailureLimiterOptions::default());
//!
//! if limiter.check("user_123", false).await? == Verdict::OverQuota {
//!     // lock the account
//! }
//! # Ok(())
//! # }
//! ```

mod local_atomic_counter;
pub use local_atomic_counter::*;
