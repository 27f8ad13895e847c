use std::time::Duration;

use ideaforge::config::QuotaConfig;
use ideaforge::rate_limit::{Decision, KeyedQuota, QuotaLimiter, Unlimited};

fn quota(points: u32, window_ms: u64) -> KeyedQuota {
    KeyedQuota::new(QuotaConfig {
        points,
        window: Duration::from_millis(window_ms),
    })
    .unwrap()
}

#[test]
fn burst_up_to_points_then_deny() {
    let q = quota(10, 1000);
    for i in 0..10 {
        assert_eq!(q.consume("1.2.3.4"), Decision::Allow, "request {i}");
    }
    assert_eq!(q.consume("1.2.3.4"), Decision::Deny);
}

#[test]
fn keys_are_independent() {
    let q = quota(1, 60_000);
    assert_eq!(q.consume("a"), Decision::Allow);
    assert_eq!(q.consume("a"), Decision::Deny);
    assert_eq!(q.consume("b"), Decision::Allow);
    assert_eq!(q.tracked_keys(), 2);
}

#[tokio::test]
async fn budget_restored_after_window() {
    let q = quota(3, 300);
    for _ in 0..3 {
        assert_eq!(q.consume("k"), Decision::Allow);
    }
    assert_eq!(q.consume("k"), Decision::Deny);

    tokio::time::sleep(Duration::from_millis(350)).await;
    for _ in 0..3 {
        assert_eq!(q.consume("k"), Decision::Allow);
    }
}

#[tokio::test]
async fn prune_forgets_idle_keys() {
    let q = quota(2, 100);
    q.consume("idle");
    tokio::time::sleep(Duration::from_millis(150)).await;
    q.prune();
    assert_eq!(q.tracked_keys(), 0);
}

#[test]
fn zero_points_rejected() {
    let err = KeyedQuota::new(QuotaConfig {
        points: 0,
        window: Duration::from_secs(1),
    });
    assert!(err.is_err());
}

#[test]
fn unlimited_always_allows() {
    for _ in 0..1000 {
        assert_eq!(Unlimited.consume("x"), Decision::Allow);
    }
}
