//! Property tests over generated payloads

use proptest::prelude::*;
use serde_json::json;

use crate::common::*;
use stratagraph::{DataId, Environment, OfflineNetwork};

fn friends_payload(names: &[String]) -> serde_json::Value {
    let friends: Vec<serde_json::Value> = names
        .iter()
        .enumerate()
        .map(|(i, name)| json!({"id": format!("f{}", i), "name": name}))
        .collect();
    json!({"me": {"id": "4", "name": "Zuck", "friends": friends}})
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_lookup_is_idempotent(names in prop::collection::vec("[a-z]{1,8}", 0..6)) {
        let env = Environment::new(OfflineNetwork);
        let op = operation(friends_query());
        env.commit_payload(&op, &payload(friends_payload(&names))).unwrap();

        let a = env.lookup(&op.fragment);
        let b = env.lookup(&op.fragment);
        prop_assert_eq!(&a.data, &b.data);
        prop_assert!(a.data.same_identity(&b.data));
        prop_assert!(!a.is_missing_data);
    }

    #[test]
    fn prop_unchanged_subtrees_keep_identity(
        names in prop::collection::vec("[a-z]{1,8}", 2..6),
        target in 0usize..6,
    ) {
        let env = Environment::new(OfflineNetwork);
        let op = operation(friends_query());
        env.commit_payload(&op, &payload(friends_payload(&names))).unwrap();
        let before = env.lookup(&op.fragment);

        let target = target % names.len();
        rename(&env, &format!("f{}", target), "changed");
        let after = env.lookup(&op.fragment);

        let list = |data: &stratagraph::Data| {
            data.get("me").and_then(|me| me.get("friends")).and_then(|f| f.as_list()).map(|l| l.to_vec())
        };
        let (before, after) = (list(&before.data).unwrap(), list(&after.data).unwrap());
        for (i, (old, new)) in before.iter().zip(after.iter()).enumerate() {
            if i == target {
                prop_assert!(!old.same_identity(new) || names[i] == "changed");
            } else {
                prop_assert!(old.same_identity(new));
            }
        }
    }

    #[test]
    fn prop_retain_then_gc_keeps_closure(
        names in prop::collection::vec("[a-z]{1,8}", 0..6),
        strays in 0usize..4,
    ) {
        let env = Environment::new(OfflineNetwork);
        let op = operation(friends_query());
        env.commit_payload(&op, &payload(friends_payload(&names))).unwrap();
        env.commit_update(|proxy| {
            for i in 0..strays {
                proxy.create(format!("stray{}", i).as_str(), "User")?;
            }
            Ok(())
        }).unwrap();

        let retained = env.retain(&op.root);
        let report = env.collect_garbage();
        prop_assert_eq!(report.evicted, strays);
        prop_assert!(env.check(&op.root));

        retained.dispose();
        env.collect_garbage();
        prop_assert!(env.store().get(&DataId::from("4")).is_none());
        prop_assert!(env.store().is_empty());
    }
}
