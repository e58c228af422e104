use std::{future::Future, time::Duration};

use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult, Script};

use crate::{AtomicCounter, FailgateError, FailgateRedisClient, runtime};

const INCREMENT_AND_CHECK_LUA: &str = r#"
    local key = KEYS[1]

    local quota = tonumber(ARGV[1])
    local expire_seconds = tonumber(ARGV[2])
    local success = tonumber(ARGV[3])

    if success == 1 then
        return 0
    end

    local current = redis.call("INCRBY", key, 1)
    if current == 1 then
        redis.call("EXPIRE", key, expire_seconds)
    end

    if current <= quota then
        return 1
    end

    return 2
"#;

const FORCE_FULL_LUA: &str = r#"
    local key = KEYS[1]

    local full = tonumber(ARGV[1]) + 1
    local expire_seconds = tonumber(ARGV[2])

    -- INCRBY keeps an existing TTL, SET would drop it
    local current = tonumber(redis.call("GET", key)) or 0
    if current < full then
        redis.call("INCRBY", key, full - current)
    end

    if redis.call("TTL", key) == -1 then
        redis.call("EXPIRE", key, expire_seconds)
    end

    return nil
"#;

const INSPECT_LUA: &str = r#"
    local key = KEYS[1]

    local value = redis.call("GET", key)
    if not value then
        return {0}
    end

    return {1, tonumber(value), redis.call("TTL", key)}
"#;

/// Options for [`RedisAtomicCounter`].
#[derive(Clone, Debug, Default)]
pub struct RedisCounterOptions {
    /// Fail a call with [`FailgateError::Timeout`] when Redis does not answer in time.
    ///
    /// The effect of a timed-out mutating call is unknown: the script may or
    /// may not have run. `None` waits for as long as the connection does.
    pub response_timeout: Option<Duration>,
}

/// [`AtomicCounter`] backed by Redis.
///
/// Each protocol operation is a single Lua script, so it executes atomically
/// on the server. Scripts are sent with `EVALSHA` and transparently re-sent
/// with `EVAL` when the server does not have them cached.
///
/// # Requirements
///
/// - **Redis:** >= 2.6 (Lua scripting)
/// - **Runtime:** Tokio or Smol (via `redis-tokio` or `redis-smol` features)
pub struct RedisAtomicCounter {
    client: FailgateRedisClient,
    response_timeout: Option<Duration>,
    increment_and_check_script: Script,
    force_full_script: Script,
    inspect_script: Script,
}

impl RedisAtomicCounter {
    /// Create a counter on top of `client`.
    pub fn new(client: FailgateRedisClient, options: RedisCounterOptions) -> Self {
        Self {
            client,
            response_timeout: options.response_timeout,
            increment_and_check_script: Script::new(INCREMENT_AND_CHECK_LUA),
            force_full_script: Script::new(FORCE_FULL_LUA),
            inspect_script: Script::new(INSPECT_LUA),
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &FailgateRedisClient {
        &self.client
    }

    async fn run<T>(
        &self,
        fut: impl Future<Output = RedisResult<T>> + Send,
    ) -> Result<T, FailgateError> {
        match self.response_timeout {
            Some(duration) => Ok(runtime::timeout(duration, fut).await??),
            None => Ok(fut.await?),
        }
    }
}

#[async_trait]
impl AtomicCounter for RedisAtomicCounter {
    async fn increment_and_check(
        &self,
        key: &str,
        quota: u64,
        expire_seconds: u64,
        success: bool,
    ) -> Result<i64, FailgateError> {
        let mut connection_manager = self.client.connection();

        let mut invocation = self.increment_and_check_script.key(key);
        invocation
            .arg(quota)
            .arg(expire_seconds)
            .arg(u8::from(success));

        self.run(invocation.invoke_async(&mut connection_manager))
            .await
    } // end method increment_and_check

    async fn force_full(
        &self,
        key: &str,
        quota: u64,
        expire_seconds: u64,
    ) -> Result<(), FailgateError> {
        let mut connection_manager = self.client.connection();

        let mut invocation = self.force_full_script.key(key);
        invocation.arg(quota).arg(expire_seconds);

        // The script replies nil, which `()` accepts.
        self.run(invocation.invoke_async(&mut connection_manager))
            .await
    } // end method force_full

    async fn inspect(&self, key: &str) -> Result<Vec<i64>, FailgateError> {
        let mut connection_manager = self.client.connection();

        let invocation = self.inspect_script.key(key);

        self.run(invocation.invoke_async(&mut connection_manager))
            .await
    } // end method inspect

    async fn get(&self, key: &str) -> Result<Option<i64>, FailgateError> {
        let mut connection_manager = self.client.connection();

        self.run(connection_manager.get(key)).await
    }

    async fn delete(&self, key: &str) -> Result<(), FailgateError> {
        let mut connection_manager = self.client.connection();

        self.run(connection_manager.del(key)).await
    }

    async fn ttl(&self, key: &str) -> Result<i64, FailgateError> {
        let mut connection_manager = self.client.connection();

        self.run(connection_manager.ttl(key)).await
    }
}
