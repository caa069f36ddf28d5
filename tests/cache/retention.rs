//! Retain counts and garbage collection

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::*;
use stratagraph::{
    DataId, Environment, EnvironmentConfig, NormalizationNode, NormalizationSelector,
    OfflineNetwork, RecordStatus, Selection, Variables,
};

fn user_node() -> Arc<NormalizationNode> {
    Arc::new(NormalizationNode::new(
        "UserFields",
        vec![Selection::scalar("id"), Selection::scalar("name")],
    ))
}

// ============================================================================
// Overlapping retains
// ============================================================================

#[test]
fn test_overlapping_retains_share_counts() {
    let (env, op) = zuck_env();
    let direct = NormalizationSelector::new("4", user_node(), Variables::new());

    let first = env.retain(&op.root);
    let second = env.retain(&direct);
    assert_eq!(env.retain_count(&DataId::from("4")), 2);

    first.dispose();
    assert_eq!(env.retain_count(&DataId::from("4")), 1);
    env.collect_garbage();
    assert!(env.store().get(&DataId::from("4")).is_some());

    second.dispose();
    assert_eq!(env.retain_count(&DataId::from("4")), 0);
    let report = env.collect_garbage();
    assert!(!report.deferred);
    assert!(report.evicted >= 1);
    assert_eq!(env.store().status(&DataId::from("4")), RecordStatus::Unknown);
}

#[test]
fn test_release_is_idempotent() {
    let (env, op) = zuck_env();
    let first = env.retain(&op.root);
    let _second = env.retain(&op.root);
    first.dispose();
    first.dispose();
    assert_eq!(env.retain_count(&DataId::from("4")), 1);
}

#[test]
fn test_gc_keeps_retained_closure_only() {
    let env = offline_env();
    let friends = operation(friends_query());
    env.commit_payload(
        &friends,
        &payload(json!({
            "me": {"id": "4", "name": "Zuck", "friends": [{"id": "1", "name": "Ann"}]}
        })),
    )
    .unwrap();
    env.commit_update(|proxy| proxy.create("5", "User")).unwrap();

    let _retained = env.retain(&friends.root);
    let report = env.collect_garbage();
    assert_eq!(report.evicted, 1);
    assert!(env.store().get(&DataId::from("4")).is_some());
    assert!(env.store().get(&DataId::from("1")).is_some());
    assert!(env.store().get(&DataId::from("5")).is_none());
    assert!(env.check(&friends.root));
}

#[test]
fn test_closure_is_recomputed_at_collection() {
    let env = offline_env();
    let friends = operation(friends_query());
    env.commit_payload(
        &friends,
        &payload(json!({
            "me": {"id": "4", "name": "Zuck", "friends": [{"id": "1", "name": "Ann"}]}
        })),
    )
    .unwrap();
    let _retained = env.retain(&friends.root);

    // "2" becomes reachable only after the retain
    env.commit_update(|proxy| {
        proxy.create("2", "User")?;
        proxy.set_value(&DataId::from("2"), "id", "2")?;
        proxy.set_value(&DataId::from("2"), "name", "Bob")?;
        proxy.set_linked_records(
            &DataId::from("4"),
            "friends",
            vec![Some(DataId::from("1")), Some(DataId::from("2"))],
        )
    })
    .unwrap();

    env.collect_garbage();
    assert!(env.store().get(&DataId::from("2")).is_some());
}

#[test]
fn test_eviction_notifies_subscribers() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("4"));
    let (calls, callback) = counter();
    let _sub = env.subscribe(&snapshot, move |_| callback());

    env.collect_garbage();
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(env.lookup(&user_selector("4")).is_missing_data);
}

// ============================================================================
// Holds and buffering
// ============================================================================

#[test]
fn test_hold_defers_until_last_release() {
    let (env, _) = zuck_env();
    let a = env.hold_gc();
    let b = env.hold_gc();
    assert!(env.collect_garbage().deferred);

    a.dispose();
    assert!(env.store().get(&DataId::from("4")).is_some());
    b.dispose();
    assert!(env.store().get(&DataId::from("4")).is_none());
}

#[test]
fn test_release_buffer_keeps_recent_roots() {
    let config = EnvironmentConfig {
        release_buffer_size: 1,
        ..EnvironmentConfig::default()
    };
    let env = Environment::with_config(OfflineNetwork, config).unwrap();
    let op = operation(user_query());
    env.commit_payload(&op, &payload(json!({"me": {"id": "4", "name": "Zuck"}})))
        .unwrap();

    let first = env.retain(&op.root);
    first.dispose();
    env.collect_garbage();
    assert!(env.store().get(&DataId::from("4")).is_some());

    let other = NormalizationSelector::new("client:root", user_node(), Variables::new());
    env.retain(&other).dispose();
    env.collect_garbage();
    assert!(env.store().get(&DataId::from("4")).is_none());
}

// ============================================================================
// Scheduler
// ============================================================================

#[test]
fn test_scheduled_gc_collects_in_background() {
    let config = EnvironmentConfig {
        gc_interval_ms: Some(10),
        ..EnvironmentConfig::default()
    };
    let env = Environment::with_config(OfflineNetwork, config).unwrap();
    let op = operation(user_query());
    env.commit_payload(&op, &payload(json!({"me": {"id": "4", "name": "Zuck"}})))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while env.store().get(&DataId::from("4")).is_some() {
        assert!(Instant::now() < deadline, "scheduler never collected");
        std::thread::sleep(Duration::from_millis(10));
    }
}
