//! Structural sharing between successive data trees
//!
//! `recycle_nodes_into` returns `next` with every sub-tree that is deeply
//! equal to the corresponding sub-tree of `prev` replaced by `prev`'s
//! allocation. When the whole tree is equal, `prev` itself comes back, so a
//! pointer comparison answers "did anything change".

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_core::{Data, DataObject};

/// Reuse allocations from `prev` wherever `next` is deeply equal to it
pub fn recycle_nodes_into(prev: &Data, next: Data) -> Data {
    if prev.same_identity(&next) {
        return prev.clone();
    }
    match (prev, &next) {
        (Data::Object(old), Data::Object(new)) => {
            let mut identical = old.len() == new.len() && old.fragment_ref() == new.fragment_ref();
            let mut fields = BTreeMap::new();
            for (key, value) in new.fields() {
                let recycled = match old.get(key) {
                    Some(previous) => recycle_nodes_into(previous, value.clone()),
                    None => value.clone(),
                };
                identical &= old
                    .get(key)
                    .map(|previous| previous.same_identity(&recycled))
                    .unwrap_or(false);
                fields.insert(key.clone(), recycled);
            }
            if identical {
                prev.clone()
            } else {
                Data::Object(Arc::new(DataObject::new(fields, new.fragment_ref().cloned())))
            }
        }
        (Data::List(old), Data::List(new)) => {
            let mut identical = old.len() == new.len();
            let items: Vec<Data> = new
                .iter()
                .enumerate()
                .map(|(index, value)| {
                    let recycled = match old.get(index) {
                        Some(previous) => recycle_nodes_into(previous, value.clone()),
                        None => value.clone(),
                    };
                    identical &= old
                        .get(index)
                        .map(|previous| previous.same_identity(&recycled))
                        .unwrap_or(false);
                    recycled
                })
                .collect();
            if identical {
                prev.clone()
            } else {
                Data::list(items)
            }
        }
        _ => next,
    }
}
