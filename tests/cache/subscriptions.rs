//! Change notification

use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::common::*;
use stratagraph::{DataId, Snapshot};

fn record_names(log: &Arc<Mutex<Vec<Option<String>>>>) -> impl Fn(&Snapshot) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |snapshot: &Snapshot| {
        log.lock().push(snapshot.data.get_str("name").map(str::to_string));
    }
}

// ============================================================================
// Exactness
// ============================================================================

#[test]
fn test_selected_field_change_notifies_once() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("4"));
    let log = Arc::new(Mutex::new(Vec::new()));
    let _sub = env.subscribe(&snapshot, record_names(&log));

    rename(&env, "4", "Mark");
    assert_eq!(*log.lock(), vec![Some("Mark".to_string())]);
}

#[test]
fn test_unrelated_record_change_is_silent() {
    let (env, _) = zuck_env();
    env.commit_update(|proxy| proxy.create("5", "User")).unwrap();
    let snapshot = env.lookup(&user_selector("4"));
    let (calls, callback) = counter();
    let _sub = env.subscribe(&snapshot, move |_| callback());

    rename(&env, "5", "Sam");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unselected_field_change_is_silent() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("4"));
    let (calls, callback) = counter();
    let _sub = env.subscribe(&snapshot, move |_| callback());

    env.commit_update(|proxy| proxy.set_value(&DataId::from("4"), "email", "zuck@fb.com"))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_same_value_write_is_silent() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("4"));
    let (calls, callback) = counter();
    let _sub = env.subscribe(&snapshot, move |_| callback());

    rename(&env, "4", "Zuck");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_coalesced_batch_notifies_once() {
    let env = offline_env();
    let op = operation(friends_query());
    env.commit_payload(
        &op,
        &payload(json!({
            "me": {"id": "4", "name": "Zuck", "friends": [{"id": "1", "name": "Ann"}, {"id": "2", "name": "Bob"}]}
        })),
    )
    .unwrap();
    let snapshot = env.lookup(&op.fragment);
    let (calls, callback) = counter();
    let _sub = env.subscribe(&snapshot, move |_| callback());

    env.commit_update(|proxy| {
        proxy.set_value(&DataId::from("4"), "name", "Mark")?;
        proxy.set_value(&DataId::from("1"), "name", "Anna")?;
        proxy.set_value(&DataId::from("2"), "name", "Bea")
    })
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_record_arrival_notifies() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("9"));
    assert!(snapshot.is_missing_data);
    let log = Arc::new(Mutex::new(Vec::new()));
    let _sub = env.subscribe(&snapshot, record_names(&log));

    env.commit_update(|proxy| {
        proxy.create("9", "User")?;
        let id = DataId::from("9");
        proxy.set_value(&id, "id", "9")?;
        proxy.set_value(&id, "name", "Nine")
    })
    .unwrap();
    assert_eq!(*log.lock(), vec![Some("Nine".to_string())]);
}

// ============================================================================
// Disposal
// ============================================================================

#[test]
fn test_disposed_subscription_is_silent() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("4"));
    let (calls, callback) = counter();
    let sub = env.subscribe(&snapshot, move |_| callback());
    sub.dispose();
    sub.dispose();
    assert_eq!(env.subscription_count(), 0);

    rename(&env, "4", "Mark");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_callback_may_dispose_other_subscription() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("4"));

    let victim_log = Arc::new(Mutex::new(Vec::new()));
    let victim = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&victim);
    let _killer = env.subscribe(&snapshot, move |_| {
        if let Some(sub) = slot.lock().take() {
            stratagraph::Disposable::dispose(&sub);
        }
    });
    *victim.lock() = Some(env.subscribe(&snapshot, record_names(&victim_log)));

    rename(&env, "4", "Mark");
    assert!(victim_log.lock().is_empty());
    assert_eq!(env.subscription_count(), 1);
}

#[test]
fn test_callback_may_dispose_itself() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("4"));
    let log = Arc::new(Mutex::new(Vec::new()));
    let record = record_names(&log);
    let handle = Arc::new(Mutex::new(None::<stratagraph::Disposable>));
    let slot = Arc::clone(&handle);
    *handle.lock() = Some(env.subscribe(&snapshot, move |s: &Snapshot| {
        record(s);
        if let Some(sub) = slot.lock().take() {
            sub.dispose();
        }
    }));
    assert_eq!(env.subscription_count(), 1);

    rename(&env, "4", "Mark");
    assert_eq!(env.subscription_count(), 0);
    rename(&env, "4", "Marcus");
    assert_eq!(*log.lock(), vec![Some("Mark".to_string())]);
}

#[test]
fn test_callback_write_runs_after_current_pass() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("4"));
    let order = Arc::new(Mutex::new(Vec::new()));

    let first_log = Arc::clone(&order);
    let writer = env.clone();
    let _first = env.subscribe(&snapshot, move |s| {
        let name = s.data.get_str("name").unwrap_or_default().to_string();
        first_log.lock().push(format!("first:{}", name));
        if name == "Mark" {
            writer
                .commit_update(|proxy| proxy.set_value(&DataId::from("4"), "name", "Marcus"))
                .unwrap();
        }
    });
    let second_log = Arc::clone(&order);
    let _second = env.subscribe(&snapshot, move |s| {
        let name = s.data.get_str("name").unwrap_or_default().to_string();
        second_log.lock().push(format!("second:{}", name));
    });

    rename(&env, "4", "Mark");
    assert_eq!(
        *order.lock(),
        vec!["first:Mark", "second:Mark", "first:Marcus", "second:Marcus"]
    );
}
