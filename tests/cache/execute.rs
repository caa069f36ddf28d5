//! `execute` against a scripted network

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

use crate::common::*;
use stratagraph::{
    CacheConfig, DataId, Environment, ExecuteRequest, GraphQLResponse, Observer, PayloadError,
    StrataError,
};

type Events = Arc<Mutex<Vec<String>>>;

fn recording_observer() -> (Observer<GraphQLResponse>, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let (a, b, c) = (Arc::clone(&events), Arc::clone(&events), Arc::clone(&events));
    let observer = Observer::new()
        .on_next(move |response: GraphQLResponse| {
            let name = response
                .data
                .as_ref()
                .and_then(|data| data.get("me"))
                .and_then(|me| me.get("name"))
                .and_then(|name| name.as_str())
                .unwrap_or("-")
                .to_string();
            a.lock().push(format!("next:{}", name));
        })
        .on_error(move |error: StrataError| b.lock().push(format!("error:{}", error)))
        .on_complete(move || c.lock().push("complete".to_string()));
    (observer, events)
}

fn setup() -> (Environment, ManualNetwork) {
    init_tracing();
    let network = ManualNetwork::new();
    (Environment::new(network.clone()), network)
}

// ============================================================================
// Laziness and payload writes
// ============================================================================

#[test]
fn test_execute_is_lazy() {
    let (env, network) = setup();
    let _observable = env.execute(ExecuteRequest::new(operation(user_query())));
    assert_eq!(network.request_count(), 0);
}

#[test]
fn test_payloads_are_written_then_reemitted() {
    let (env, network) = setup();
    let op = operation(user_query());
    let (observer, events) = recording_observer();
    let _sub = env.execute(ExecuteRequest::new(op.clone())).subscribe(observer);
    assert_eq!(network.request_count(), 1);

    network.emit(0, json!({"me": {"id": "4", "name": "Zuck"}}));
    assert_eq!(env.lookup(&op.fragment).data.get("me").and_then(|m| m.get_str("name")), Some("Zuck"));

    network.emit(0, json!({"me": {"id": "4", "name": "Mark"}}));
    network.complete(0);
    assert_eq!(*events.lock(), vec!["next:Zuck", "next:Mark", "complete"]);
    assert_eq!(env.lookup(&op.fragment).data.get("me").and_then(|m| m.get_str("name")), Some("Mark"));
}

#[test]
fn test_each_subscription_is_a_request() {
    let (env, network) = setup();
    let observable = env.execute(ExecuteRequest::new(operation(user_query())));
    let _a = observable.subscribe(Observer::new());
    let _b = observable.subscribe(Observer::new());
    assert_eq!(network.request_count(), 2);
}

#[test]
fn test_request_parameters_reach_network() {
    let (env, network) = setup();
    let request = ExecuteRequest::new(operation(user_query())).with_cache_config(CacheConfig::force());
    let _sub = env.execute(request).subscribe(Observer::new());

    let (params, _, cache_config) = network.request(0);
    assert_eq!(params.name, "UserQuery");
    assert!(cache_config.force);
}

#[test]
fn test_updater_runs_with_payload() {
    let (env, network) = setup();
    let request = ExecuteRequest::new(operation(user_query())).with_updater(|proxy, data| {
        assert!(data.is_some());
        let root = proxy.get_or_create_root();
        proxy.set_value(&root, "lastFetched", "UserQuery")
    });
    let _sub = env.execute(request).subscribe(Observer::new());
    network.emit(0, json!({"me": {"id": "4", "name": "Zuck"}}));

    let root = env.store().get(&DataId::root()).unwrap();
    assert_eq!(
        root.get("lastFetched"),
        Some(&stratagraph::FieldValue::scalar("UserQuery"))
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_network_error_is_routed_to_observer() {
    let (env, network) = setup();
    let (observer, events) = recording_observer();
    let _sub = env.execute(ExecuteRequest::new(operation(user_query()))).subscribe(observer);
    network.fail(0, "offline");
    assert_eq!(*events.lock(), vec!["error:Network error: offline"]);
}

#[test]
fn test_response_without_data_is_an_error() {
    let (env, network) = setup();
    let (observer, events) = recording_observer();
    let _sub = env.execute(ExecuteRequest::new(operation(user_query()))).subscribe(observer);
    network.respond(
        0,
        GraphQLResponse {
            data: None,
            errors: vec![PayloadError {
                message: "denied".to_string(),
                path: None,
            }],
        },
    );
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert!(events[0].starts_with("error:"));
    assert!(events[0].contains("denied"));
}

#[test]
fn test_malformed_payload_is_an_error() {
    let (env, network) = setup();
    let (observer, events) = recording_observer();
    let _sub = env.execute(ExecuteRequest::new(operation(user_query()))).subscribe(observer);
    network.emit(0, json!({"me": "not an object"}));
    assert!(events.lock()[0].starts_with("error:"));
    assert_eq!(env.store().current_version(), 0);
}

#[test]
fn test_processing_error_cancels_upstream() {
    let (env, network) = setup();
    let (observer, events) = recording_observer();
    let sub = env.execute(ExecuteRequest::new(operation(user_query()))).subscribe(observer);
    network.emit(0, json!({"me": "not an object"}));
    assert_eq!(network.cancelled(), 1);

    network.emit(0, json!({"me": {"id": "4", "name": "Zuck"}}));
    assert_eq!(events.lock().len(), 1);
    assert_eq!(env.store().current_version(), 0);

    sub.dispose();
    assert_eq!(network.cancelled(), 1);
}

// ============================================================================
// Cancellation and GC
// ============================================================================

#[test]
fn test_dispose_cancels_upstream_and_silences() {
    let (env, network) = setup();
    let (observer, events) = recording_observer();
    let sub = env.execute(ExecuteRequest::new(operation(user_query()))).subscribe(observer);

    sub.dispose();
    assert_eq!(network.cancelled(), 1);
    network.emit(0, json!({"me": {"id": "4", "name": "Zuck"}}));
    assert!(events.lock().is_empty());
    assert_eq!(env.store().current_version(), 0);
}

#[test]
fn test_dispose_after_complete_is_harmless() {
    let (env, network) = setup();
    let (observer, events) = recording_observer();
    let sub = env.execute(ExecuteRequest::new(operation(user_query()))).subscribe(observer);
    network.emit(0, json!({"me": {"id": "4", "name": "Zuck"}}));
    network.complete(0);
    sub.dispose();
    sub.dispose();
    assert_eq!(*events.lock(), vec!["next:Zuck", "complete"]);
}

#[test]
fn test_gc_is_held_while_in_flight() {
    let (env, network) = setup();
    let _sub = env.execute(ExecuteRequest::new(operation(user_query()))).subscribe(Observer::new());
    network.emit(0, json!({"me": {"id": "4", "name": "Zuck"}}));

    assert!(env.collect_garbage().deferred);
    assert!(env.store().get(&DataId::from("4")).is_some());

    network.complete(0);
    assert!(env.store().get(&DataId::from("4")).is_none());
}
