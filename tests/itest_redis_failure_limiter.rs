#![cfg(feature = "redis-tokio")]

use std::{env, sync::Arc, time::Duration};

use failgate::{
    FailgateError, FailgateRedisClient, FailureLimiter, FailureLimiterOptions, KeyPrefix, KeyTtl,
    PeriodSeconds, Quota, RedisAtomicCounter, RedisCounterOptions, Verdict,
};

fn redis_url() -> Option<String> {
    env::var("REDIS_URL").ok()
}

fn unique_prefix() -> KeyPrefix {
    let n: u64 = rand::random();
    KeyPrefix::try_from(format!("failgate_test_{n}:")).unwrap()
}

fn options(period: u64, quota: u64, align: bool) -> FailureLimiterOptions {
    FailureLimiterOptions {
        period: PeriodSeconds::try_from(period).unwrap(),
        quota: Quota::try_from(quota).unwrap(),
        key_prefix: unique_prefix(),
        align,
    }
}

async fn build_client(url: &str) -> FailgateRedisClient {
    let client = redis::Client::open(url).unwrap();
    FailgateRedisClient::from_client(client, 2).await.unwrap()
}

async fn build_limiter(url: &str, period: u64, quota: u64) -> FailureLimiter<RedisAtomicCounter> {
    FailureLimiter::redis(build_client(url).await, options(period, quota, false))
}

#[test]
fn four_failures_with_quota_three() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limiter = build_limiter(&url, 60, 3).await;

        let mut verdicts = Vec::new();
        for _ in 0..4 {
            verdicts.push(limiter.check("u1", false).await.unwrap());
        }

        assert_eq!(
            verdicts,
            vec![
                Verdict::InQuota,
                Verdict::InQuota,
                Verdict::InQuota,
                Verdict::OverQuota
            ]
        );
        assert_eq!(limiter.get_count("u1").await.unwrap(), Some(4));

        let ttl = limiter.ttl("u1").await.unwrap().remaining().unwrap();
        assert!(ttl <= Duration::from_secs(60) && ttl >= Duration::from_secs(58));

        limiter.delete("u1").await.unwrap();
    });
}

#[test]
fn never_checked_key_has_no_run_value() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limiter = build_limiter(&url, 60, 3).await;

        let run_value = limiter.get_run_value("nobody").await.unwrap();
        assert!(!run_value.exist);
        assert_eq!(run_value.count, 0);
        assert_eq!(run_value.ttl, KeyTtl::Missing);

        assert_eq!(limiter.get_count("nobody").await.unwrap(), None);
        assert_eq!(limiter.ttl("nobody").await.unwrap(), KeyTtl::Missing);
    });
}

#[test]
fn success_never_changes_count_or_ttl() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limiter = build_limiter(&url, 60, 3).await;

        assert_eq!(limiter.check("u1", true).await.unwrap(), Verdict::Success);
        assert_eq!(limiter.get_count("u1").await.unwrap(), None);

        limiter.check("u1", false).await.unwrap();
        assert_eq!(limiter.check("u1", true).await.unwrap(), Verdict::Success);

        let run_value = limiter.get_run_value("u1").await.unwrap();
        assert!(run_value.exist);
        assert_eq!(run_value.count, 1);
        assert!(run_value.ttl.remaining().is_some());

        limiter.delete("u1").await.unwrap();
    });
}

#[test]
fn set_quota_full_is_idempotent_and_keeps_ttl() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limiter = build_limiter(&url, 60, 3).await;

        limiter.set_quota_full("fresh").await.unwrap();
        limiter.set_quota_full("fresh").await.unwrap();
        assert_eq!(limiter.get_count("fresh").await.unwrap(), Some(4));
        assert!(limiter.ttl("fresh").await.unwrap().remaining().is_some());
        assert_eq!(
            limiter.check("fresh", false).await.unwrap(),
            Verdict::OverQuota
        );

        // An existing short window is neither extended nor lowered.
        let short = FailureLimiter::new(
            RedisAtomicCounter::new(limiter.counter().client().clone(), Default::default()),
            FailureLimiterOptions {
                period: PeriodSeconds::try_from(5).unwrap(),
                ..limiter.options().clone()
            },
        );
        for _ in 0..6 {
            short.check("busy", false).await.unwrap();
        }
        limiter.set_quota_full("busy").await.unwrap();

        assert_eq!(limiter.get_count("busy").await.unwrap(), Some(6));
        let ttl = limiter.ttl("busy").await.unwrap().remaining().unwrap();
        assert!(ttl <= Duration::from_secs(5), "ttl was replaced: {ttl:?}");

        limiter.delete("fresh").await.unwrap();
        limiter.delete("busy").await.unwrap();
    });
}

#[test]
fn delete_round_trip() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limiter = build_limiter(&url, 60, 3).await;

        limiter.check("u1", false).await.unwrap();
        limiter.delete("u1").await.unwrap();
        limiter.delete("u1").await.unwrap();

        assert!(!limiter.get_run_value("u1").await.unwrap().exist);
        assert_eq!(limiter.ttl("u1").await.unwrap(), KeyTtl::Missing);
    });
}

#[test]
fn window_rolls_over_after_period() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limiter = build_limiter(&url, 1, 1).await;

        assert_eq!(limiter.check("u1", false).await.unwrap(), Verdict::InQuota);
        assert_eq!(
            limiter.check("u1", false).await.unwrap(),
            Verdict::OverQuota
        );

        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(limiter.check("u1", false).await.unwrap(), Verdict::InQuota);

        limiter.delete("u1").await.unwrap();
    });
}

#[test]
fn aligned_daily_ttl_matches_local_clock() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limiter = FailureLimiter::redis(build_client(&url).await, options(86_400, 3, true));

        let expected = limiter.window_policy().expire_seconds();
        limiter.check("u1", false).await.unwrap();

        let ttl = limiter.ttl("u1").await.unwrap().remaining().unwrap();
        assert!(
            ttl.as_secs().abs_diff(expected) <= 2,
            "expected ~{expected}s, got {ttl:?}"
        );

        limiter.delete("u1").await.unwrap();
    });
}

#[test]
fn concurrent_failures_cross_the_quota_exactly_once() {
    let Some(url) = redis_url() else {
        return;
    };

    const QUOTA: u64 = 10;
    const CALLS: usize = 100;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let limiter = Arc::new(build_limiter(&url, 60, QUOTA).await);

        let mut handles = Vec::with_capacity(CALLS);
        for _ in 0..CALLS {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(
                async move { limiter.check("hot", false).await },
            ));
        }

        let mut in_quota = 0;
        let mut over_quota = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Verdict::InQuota => in_quota += 1,
                Verdict::OverQuota => over_quota += 1,
                other => panic!("unexpected verdict {other:?}"),
            }
        }

        assert_eq!(in_quota, QUOTA as usize);
        assert_eq!(over_quota, CALLS - QUOTA as usize);
        assert_eq!(limiter.get_count("hot").await.unwrap(), Some(CALLS as u64));

        limiter.delete("hot").await.unwrap();
    });
}

#[test]
fn response_timeout_fails_as_transport_error() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let counter = RedisAtomicCounter::new(
            build_client(&url).await,
            RedisCounterOptions {
                response_timeout: Some(Duration::from_nanos(1)),
            },
        );
        let limiter = FailureLimiter::new(counter, options(60, 3, false));

        let err = limiter.check("u1", false).await.unwrap_err();

        assert!(matches!(err, FailgateError::Timeout(_)), "got {err:?}");
        assert!(err.is_transport());
    });
}

#[test]
fn zero_connection_count_is_rejected() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let client = redis::Client::open(url.as_str()).unwrap();
        let err = FailgateRedisClient::from_client(client, 0)
            .await
            .unwrap_err();

        assert!(matches!(err, FailgateError::InvalidConnectionCount(_)));
    });
}

#[test]
fn largest_quota_and_period_reach_redis_as_integers() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let limiter = FailureLimiter::redis(
            build_client(&url).await,
            FailureLimiterOptions {
                period: PeriodSeconds::try_from(PeriodSeconds::MAX).unwrap(),
                quota: Quota::try_from(Quota::MAX).unwrap(),
                key_prefix: unique_prefix(),
                align: false,
            },
        );

        assert_eq!(limiter.check("u1", false).await.unwrap(), Verdict::InQuota);
        limiter.set_quota_full("u1").await.unwrap();

        let run_value = limiter.get_run_value("u1").await.unwrap();
        assert!(run_value.exist);
        assert_eq!(run_value.count, Quota::MAX + 1);

        let ttl = run_value.ttl.remaining().unwrap();
        assert!(ttl.as_secs().abs_diff(PeriodSeconds::MAX) <= 2, "got {ttl:?}");

        limiter.delete("u1").await.unwrap();
    });
}

#[test]
fn client_debug_shows_connection_count() {
    let Some(url) = redis_url() else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let client = build_client(&url).await;

        assert_eq!(client.connection_count(), 2);
        assert!(format!("{client:?}").contains("connection_count: 2"));
    });
}
