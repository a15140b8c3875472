use std::sync::Arc;

use bytes::Bytes;
use strata_common::{AddrInfo, Cid, Multiaddr, PeerId};
use strata_routing::{Routing, RoutingError, TieredRouter, DEFAULT_PRIORITY};

use crate::mock::{call_log, MockRouter};

fn tier(priority: i64, router: MockRouter) -> (i64, Arc<dyn Routing>) {
    (priority, Arc::new(router))
}

#[tokio::test]
async fn tiers_are_queried_in_priority_order() {
    let _ = tracing_subscriber::fmt::try_init();

    let log = call_log();
    let tiered = TieredRouter::from_prioritized([
        tier(50, MockRouter::new("p50", &log)),
        tier(DEFAULT_PRIORITY, MockRouter::new("default", &log)),
        tier(10, MockRouter::new("p10", &log)),
    ]);

    assert_eq!(tiered.get_value(&Bytes::from_static(b"missing")).await.unwrap(), None);

    let order: Vec<_> = log.lock().iter().map(|(name, _)| *name).collect();
    assert_eq!(order, vec!["p10", "p50", "default"]);
}

#[tokio::test]
async fn equal_priorities_keep_configuration_order() {
    let log = call_log();
    let tiered = TieredRouter::from_prioritized([
        tier(5, MockRouter::new("first", &log)),
        tier(1, MockRouter::new("top", &log)),
        tier(5, MockRouter::new("second", &log)),
    ]);

    tiered.find_peer(&PeerId::new("nobody")).await.unwrap();

    let order: Vec<_> = log.lock().iter().map(|(name, _)| *name).collect();
    assert_eq!(order, vec!["top", "first", "second"]);
}

#[tokio::test]
async fn first_answer_wins_and_later_tiers_are_skipped() {
    let log = call_log();
    let tiered = TieredRouter::new(vec![
        Arc::new(MockRouter::new("empty", &log)),
        Arc::new(MockRouter::new("hit", &log).with_value(b"k", b"from-hit")),
        Arc::new(MockRouter::new("never", &log).with_value(b"k", b"from-never")),
    ]);

    let value = tiered.get_value(&Bytes::from_static(b"k")).await.unwrap();
    assert_eq!(value, Some(Bytes::from_static(b"from-hit")));

    let asked: Vec<_> = log.lock().iter().map(|(name, _)| *name).collect();
    assert_eq!(asked, vec!["empty", "hit"]);
}

#[tokio::test]
async fn errors_are_suppressed_when_another_tier_answers() {
    let log = call_log();
    let peer =
        AddrInfo::new(PeerId::new("peer")).with_addr(Multiaddr::new("/ip4/10.0.0.1/tcp/4001"));
    let tiered = TieredRouter::new(vec![
        Arc::new(MockRouter::new("down", &log).failing()),
        Arc::new(MockRouter::new("up", &log).with_peer(peer.clone())),
    ]);

    let found = tiered.find_peer(&PeerId::new("peer")).await.unwrap();
    assert_eq!(found, Some(peer));
}

#[tokio::test]
async fn last_error_surfaces_when_all_tiers_fail() {
    let log = call_log();
    let tiered = TieredRouter::new(vec![
        Arc::new(MockRouter::new("a", &log).failing()),
        Arc::new(MockRouter::new("b", &log).failing()),
    ]);

    let err = tiered.get_value(&Bytes::from_static(b"k")).await.unwrap_err();
    assert!(err.to_string().contains("b is down"), "{err}");

    let err = tiered.put_value(&Bytes::from_static(b"k"), Bytes::new()).await.unwrap_err();
    assert!(err.to_string().contains("b is down"), "{err}");
}

#[tokio::test]
async fn writes_go_to_every_tier() {
    let log = call_log();
    let a = Arc::new(MockRouter::new("a", &log));
    let b = Arc::new(MockRouter::new("b", &log).failing());
    let c = Arc::new(MockRouter::new("c", &log));
    let tiered = TieredRouter::new(vec![a.clone(), b, c.clone()]);

    tiered.put_value(&Bytes::from_static(b"k"), Bytes::from_static(b"v")).await.unwrap();
    assert_eq!(a.value(b"k"), Some(Bytes::from_static(b"v")));
    assert_eq!(c.value(b"k"), Some(Bytes::from_static(b"v")));

    tiered.provide(&Cid::from("bafy"), true).await.unwrap();
    let provides = log.lock().iter().filter(|(_, op)| *op == "provide").count();
    assert_eq!(provides, 3);
}

#[tokio::test]
async fn find_providers_merges_and_limits() {
    let log = call_log();
    let tiered = TieredRouter::new(vec![
        Arc::new(MockRouter::new("a", &log).with_provider("p1").with_provider("p2")),
        Arc::new(MockRouter::new("b", &log).failing()),
        Arc::new(
            MockRouter::new("c", &log).with_provider("p2").with_provider("p3").with_provider("p4"),
        ),
    ]);

    let cid = Cid::from("bafy");
    let all: Vec<_> = tiered
        .find_providers(&cid, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id.to_string())
        .collect();
    assert_eq!(all, vec!["p1", "p2", "p3", "p4"]);

    let limited = tiered.find_providers(&cid, 3).await.unwrap();
    assert_eq!(limited.len(), 3);
}

#[tokio::test]
async fn bootstrap_reports_every_failure() {
    let log = call_log();
    let tiered = TieredRouter::new(vec![
        Arc::new(MockRouter::new("a", &log).failing()),
        Arc::new(MockRouter::new("b", &log)),
        Arc::new(MockRouter::new("c", &log).failing()),
    ]);

    match tiered.bootstrap().await {
        Err(RoutingError::Multiple(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected two bootstrap failures, got {other:?}"),
    }
}

#[tokio::test]
async fn provide_many_is_none_without_capable_routers() {
    let log = call_log();
    let tiered = TieredRouter::new(vec![
        Arc::new(MockRouter::new("a", &log)),
        Arc::new(MockRouter::new("b", &log)),
    ]);

    assert!(tiered.provide_many().is_none());
}

#[tokio::test]
async fn provide_many_fans_out_to_capable_routers_only() {
    let _ = tracing_subscriber::fmt::try_init();

    let log = call_log();
    let a = Arc::new(MockRouter::new("a", &log).with_batch());
    let b = Arc::new(MockRouter::new("b", &log));
    let c = Arc::new(MockRouter::new("c", &log).with_batch());
    let tiered = TieredRouter::new(vec![a.clone(), b.clone(), c.clone()]);

    let pm = tiered.provide_many().expect("two routers support batch provides");
    assert!(pm.ready());

    let keys = vec![Cid::from("k1"), Cid::from("k2")];
    pm.provide_many(&keys).await.unwrap();

    assert_eq!(*a.batches.lock(), vec![keys.clone()]);
    assert_eq!(*c.batches.lock(), vec![keys]);
    assert!(b.batches.lock().is_empty());

    let mut called: Vec<_> =
        log.lock().iter().filter(|(_, op)| *op == "provide_many").map(|(n, _)| *n).collect();
    called.sort_unstable();
    assert_eq!(called, vec!["a", "c"]);
}

#[tokio::test]
async fn provide_many_failure_does_not_block_other_routers() {
    let log = call_log();
    let down = Arc::new(MockRouter::new("down", &log).with_batch().failing());
    let up = Arc::new(MockRouter::new("up", &log).with_batch().not_ready());
    let tiered = TieredRouter::new(vec![down, up.clone()]);

    let pm = tiered.provide_many().unwrap();
    assert!(!pm.ready());

    let err = pm.provide_many(&[Cid::from("k")]).await.unwrap_err();
    assert!(err.to_string().contains("down is down"), "{err}");
    assert_eq!(up.batches.lock().len(), 1);
}

#[tokio::test]
async fn nested_tiered_routers_expose_batch_capability() {
    let log = call_log();
    let inner = TieredRouter::new(vec![Arc::new(MockRouter::new("inner", &log).with_batch())]);
    let outer = TieredRouter::new(vec![Arc::new(inner), Arc::new(MockRouter::new("plain", &log))]);

    let pm = outer.provide_many().unwrap();
    pm.provide_many(&[Cid::from("k")]).await.unwrap();

    assert!(log.lock().contains(&("inner", "provide_many")));
}
