use std::time::Duration;

/// Error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum FailgateError {
    /// Redis error.
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// The store did not answer within the configured response timeout.
    ///
    /// The outcome of a mutating call that timed out is unknown.
    #[error("store did not respond within {0:?}")]
    Timeout(Duration),

    /// The counter script returned a result code outside the known set.
    #[error("unknown result code from counter script: {0}")]
    UnknownCode(i64),

    /// The inspection script or a plain read returned an unexpected shape.
    #[error("unexpected reply from counter store: {0:?}")]
    UnknownReply(Vec<i64>),

    /// Invalid period.
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// Invalid quota.
    #[error("invalid quota: {0}")]
    InvalidQuota(String),

    /// Invalid key prefix.
    #[error("invalid key prefix: {0}")]
    InvalidKeyPrefix(String),

    /// Invalid connection count for [`crate::FailgateRedisClient`].
    #[error("invalid connection count: {0}")]
    InvalidConnectionCount(String),
}

impl FailgateError {
    /// `true` when the store could not be reached or did not answer in time.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::RedisError(_) | Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// `true` when the store answered outside the counter protocol, which
    /// usually means the scripts and this crate are out of sync.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::UnknownCode(_) | Self::UnknownReply(_))
    }
}
