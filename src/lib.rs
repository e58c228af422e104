#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod atomic_counter;
pub use atomic_counter::*;

mod failure_limiter;
pub use failure_limiter::*;

mod window_policy;
pub use window_policy::*;

pub mod local;
pub use local::*;

#[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "redis-tokio", feature = "redis-smol"))))]
pub mod redis;
#[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
pub use crate::redis::*;

#[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
mod runtime;

mod error;
pub use error::*;

mod common;
pub use common::{KeyPrefix, KeyTtl, PeriodSeconds, Quota, RunValue, Verdict};

#[cfg(test)]
mod tests;
