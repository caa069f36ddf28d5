//! Reads, checks and payload round-trips

use serde_json::json;
use std::sync::Arc;

use crate::common::*;
use stratagraph::{
    Data, DataId, NormalizationNode, NormalizationSelector, ReaderFragment, ReaderSelector,
    RecordStatus, Selection, Variables,
};

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn test_lookup_existing_record() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("4"));
    assert_eq!(snapshot.data.get_str("id"), Some("4"));
    assert_eq!(snapshot.data.get_str("name"), Some("Zuck"));
    assert!(!snapshot.is_missing_data);
    assert!(snapshot.seen_records.contains(&DataId::from("4")));
}

#[test]
fn test_lookup_unknown_record_is_missing() {
    let (env, _) = zuck_env();
    let snapshot = env.lookup(&user_selector("9"));
    assert_eq!(snapshot.data, Data::Null);
    assert!(snapshot.is_missing_data);
    assert!(snapshot.seen_records.contains(&DataId::from("9")));

    let check_selector = NormalizationSelector::new(
        "9",
        Arc::new(NormalizationNode::new(
            "UserFields",
            vec![Selection::scalar("id"), Selection::scalar("name")],
        )),
        Variables::new(),
    );
    assert!(!env.check(&check_selector));
}

#[test]
fn test_missing_field_does_not_abort_siblings() {
    let (env, _) = zuck_env();
    let selector = ReaderSelector::new(
        "4",
        Arc::new(ReaderFragment::new(
            "UserEmail",
            "User",
            vec![Selection::scalar("name"), Selection::scalar("email")],
        )),
        Variables::new(),
    );
    let snapshot = env.lookup(&selector);
    assert!(snapshot.is_missing_data);
    assert_eq!(snapshot.data.get_str("name"), Some("Zuck"));
    assert_eq!(snapshot.data.get("email"), Some(&Data::Null));
}

#[test]
fn test_deleted_record_reads_null_and_missing() {
    let (env, op) = zuck_env();
    assert!(env.check(&op.root));
    env.commit_update(|proxy| {
        proxy.delete("4");
        Ok(())
    })
    .unwrap();
    assert_eq!(env.store().status(&DataId::from("4")), RecordStatus::Nonexistent);

    let snapshot = env.lookup(&user_selector("4"));
    assert_eq!(snapshot.data, Data::Null);
    assert!(snapshot.is_missing_data);
    assert!(!env.check(&op.root));
}

// ============================================================================
// Check
// ============================================================================

#[test]
fn test_check_after_commit() {
    let env = offline_env();
    let op = operation(friends_query());
    assert!(!env.check(&op.root));

    env.commit_payload(
        &op,
        &payload(json!({
            "me": {"id": "4", "name": "Zuck", "friends": [{"id": "1", "name": "Ann"}]}
        })),
    )
    .unwrap();
    assert!(env.check(&op.root));
}

// ============================================================================
// Round-trip
// ============================================================================

#[test]
fn test_payload_round_trips_through_reader() {
    let env = offline_env();
    let op = operation(friends_query());
    let data = json!({
        "me": {
            "id": "4",
            "name": "Zuck",
            "friends": [{"id": "1", "name": "Ann"}, {"id": "2", "name": "Bob"}]
        }
    });
    env.commit_payload(&op, &payload(data.clone())).unwrap();

    let snapshot = env.lookup(&op.fragment);
    assert!(!snapshot.is_missing_data);
    assert_eq!(snapshot.data.to_json(), data);
}

#[test]
fn test_objects_without_id_get_client_ids() {
    let env = offline_env();
    let op = operation(friends_query());
    env.commit_payload(
        &op,
        &payload(json!({
            "me": {"id": "4", "name": "Zuck", "friends": [{"id": null, "name": "Anonymous"}]}
        })),
    )
    .unwrap();

    let friend = env
        .store()
        .get(&DataId::from("4"))
        .and_then(|me| me.get("friends").cloned())
        .expect("friends stored");
    let ids = friend.referenced_ids();
    assert_eq!(ids.len(), 1);
    assert!(ids[0].is_client_id());
}

#[test]
fn test_shape_change_rejects_whole_batch() {
    let (env, op) = zuck_env();
    let version = env.store().current_version();

    // `me` is a reference; a scalar list there is a shape change
    let result = env.commit_update(|proxy| {
        let root = proxy.get_or_create_root();
        proxy.set_value(&DataId::from("4"), "name", "Mark")?;
        proxy.set_field(
            &root,
            "me",
            stratagraph::FieldValue::ScalarList(vec![stratagraph::Value::from("x")]),
        )
    });
    assert!(result.is_err());
    assert_eq!(env.store().current_version(), version);
    assert_eq!(
        env.lookup(&op.fragment).data.get("me").and_then(|me| me.get_str("name")),
        Some("Zuck")
    );
}
