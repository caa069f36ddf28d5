//! Fragment spec resolver over a live environment

use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::common::*;
use stratagraph::{Data, FragmentMap, FragmentSpecResolver, Props};

fn profile_props(env: &stratagraph::Environment) -> Props {
    let op = operation(profile_query());
    env.commit_payload(&op, &payload(json!({"me": {"id": "4", "name": "Zuck"}})))
        .unwrap();
    let root = env.lookup(&op.fragment).data;
    let mut props = Props::new();
    props.insert("user".to_string(), root.get("me").cloned().unwrap_or(Data::Null));
    props
}

fn fragments() -> FragmentMap {
    let mut fragments = FragmentMap::new();
    fragments.insert("user".to_string(), user_profile());
    fragments
}

#[test]
fn test_resolver_follows_store_writes() {
    let env = offline_env();
    let props = profile_props(&env);
    let (calls, callback) = counter();
    let resolver =
        FragmentSpecResolver::new(env.clone(), fragments(), &props, Some(Arc::new(callback))).unwrap();
    assert_eq!(resolver.resolve()["user"].get_str("name"), Some("Zuck"));

    rename(&env, "4", "Mark");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.resolve()["user"].get_str("name"), Some("Mark"));
}

#[test]
fn test_set_callback_replaces_callback() {
    let env = offline_env();
    let props = profile_props(&env);
    let (first_calls, first) = counter();
    let (second_calls, second) = counter();
    let mut resolver =
        FragmentSpecResolver::new(env.clone(), fragments(), &props, Some(Arc::new(first))).unwrap();
    resolver.set_callback(second);

    rename(&env, "4", "Mark");
    assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_evicted_record_resolves_missing() {
    let env = offline_env();
    let props = profile_props(&env);
    let (calls, callback) = counter();
    let resolver =
        FragmentSpecResolver::new(env.clone(), fragments(), &props, Some(Arc::new(callback))).unwrap();

    env.collect_garbage();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(resolver.is_missing_data());
    assert_eq!(resolver.resolve()["user"], Data::Null);
}

#[test]
fn test_resolve_is_pure() {
    let env = offline_env();
    let props = profile_props(&env);
    let resolver = FragmentSpecResolver::new(env.clone(), fragments(), &props, None).unwrap();
    let version = env.store().current_version();
    let subscriptions = env.subscription_count();

    let a = resolver.resolve();
    let b = resolver.resolve();
    assert!(a["user"].same_identity(&b["user"]));
    assert_eq!(env.store().current_version(), version);
    assert_eq!(env.subscription_count(), subscriptions);
}
