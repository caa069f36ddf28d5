//! Fragment spec resolver: props in, resolved fragment data out
//!
//! # Design Notes
//!
//! - **One state machine per prop key**: a key is either unsubscribed or
//!   subscribed with the selector(s) derived from its prop
//! - **Contract errors are synchronous**: every prop is turned into a
//!   selector before any subscription changes, so a bad prop leaves the
//!   resolver untouched
//! - **Coalesced callback**: per-key updates mark the resolver dirty; the
//!   external callback runs once after the notification pass that caused
//!   them, with no resolver lock held
//! - **No missed writes**: a new subscription re-reads its selector after
//!   subscribing, so a commit landing between the first read and the
//!   subscribe is not lost

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use strata_core::{
    get_fragment_variables, get_selectors_from_object, ConcreteRequest, Data, Disposable,
    FragmentMap, PropSelector, Props, ReaderSelector, RequestDescriptor, Snapshot, StrataResult,
    Variables,
};

use crate::environment::{Environment, WeakEnvironment};

/// External change callback
pub type ResolverCallback = Arc<dyn Fn() + Send + Sync>;

struct Item {
    snapshot: Snapshot,
    disposable: Disposable,
}

struct Subscribed {
    prop: Data,
    selector: PropSelector,
    generation: u64,
    items: Vec<Item>,
    data: Data,
}

impl Subscribed {
    fn project(&self) -> Data {
        match &self.selector {
            PropSelector::Singular(_) => self
                .items
                .first()
                .map(|item| item.snapshot.data.clone())
                .unwrap_or(Data::Null),
            PropSelector::Plural(_) => {
                Data::list(self.items.iter().map(|item| item.snapshot.data.clone()).collect())
            }
        }
    }
}

enum KeyState {
    Unsubscribed,
    Subscribed(Subscribed),
}

impl KeyState {
    fn take_items(&mut self) -> Vec<Item> {
        match std::mem::replace(self, KeyState::Unsubscribed) {
            KeyState::Subscribed(subscribed) => subscribed.items,
            KeyState::Unsubscribed => Vec::new(),
        }
    }
}

struct ResolverShared {
    keys: BTreeMap<String, KeyState>,
    callback: Option<ResolverCallback>,
    notify_scheduled: bool,
    disposed: bool,
    next_generation: u64,
}

/// Keeps the data of a fragment map up to date for a changing set of props
///
/// # Example
///
/// ```ignore
/// let mut fragments = FragmentMap::new();
/// fragments.insert("user".to_string(), user_profile_fragment);
/// let mut resolver = FragmentSpecResolver::new(env.clone(), fragments, &props, None)?;
/// resolver.set_callback(|| println!("user changed"));
/// let user = &resolver.resolve()["user"];
/// ```
pub struct FragmentSpecResolver {
    environment: Environment,
    fragments: FragmentMap,
    shared: Arc<Mutex<ResolverShared>>,
}

impl FragmentSpecResolver {
    /// Create a resolver and subscribe to the initial props
    ///
    /// # Errors
    ///
    /// `InvalidFragmentReference` if a prop does not match its fragment.
    pub fn new(
        environment: Environment,
        fragments: FragmentMap,
        props: &Props,
        callback: Option<ResolverCallback>,
    ) -> StrataResult<Self> {
        let keys = fragments
            .keys()
            .map(|key| (key.clone(), KeyState::Unsubscribed))
            .collect();
        let mut resolver = Self {
            environment,
            fragments,
            shared: Arc::new(Mutex::new(ResolverShared {
                keys,
                callback,
                notify_scheduled: false,
                disposed: false,
                next_generation: 1,
            })),
        };
        resolver.set_props(props)?;
        Ok(resolver)
    }

    /// Replace the props
    ///
    /// Keys whose prop keeps its identity or derives an equal selector are
    /// left alone. Null props drop their key's subscription.
    ///
    /// # Errors
    ///
    /// `InvalidFragmentReference` if a prop does not match its fragment; no
    /// key changes in that case.
    pub fn set_props(&mut self, props: &Props) -> StrataResult<()> {
        let selectors = get_selectors_from_object(&self.fragments, props)?;
        for (key, selector) in selectors {
            let prop = props.get(&key).cloned().unwrap_or(Data::Null);
            match selector {
                None => self.unsubscribe_key(&key),
                Some(selector) => {
                    if self.is_current(&key, &prop, &selector) {
                        continue;
                    }
                    self.subscribe_key(&key, prop, selector);
                }
            }
        }
        Ok(())
    }

    /// Re-read every subscribed key with `variables`, owned by `request`
    pub fn set_variables(&mut self, variables: &Variables, request: Arc<ConcreteRequest>) {
        let owner = Arc::new(RequestDescriptor {
            request,
            variables: variables.clone(),
        });
        let current: Vec<(String, Data, PropSelector)> = {
            let shared = self.shared.lock();
            shared
                .keys
                .iter()
                .filter_map(|(key, state)| match state {
                    KeyState::Subscribed(s) => Some((key.clone(), s.prop.clone(), s.selector.clone())),
                    KeyState::Unsubscribed => None,
                })
                .collect()
        };

        for (key, prop, selector) in current {
            let rebind = |selector: &ReaderSelector, item: &Data| ReaderSelector {
                data_id: selector.data_id.clone(),
                node: Arc::clone(&selector.node),
                variables: get_fragment_variables(
                    &selector.node,
                    variables,
                    &spread_arguments(item, &selector.node.name),
                ),
                owner: Some(Arc::clone(&owner)),
            };
            let next = match &selector {
                PropSelector::Singular(s) => PropSelector::Singular(rebind(s, &prop)),
                PropSelector::Plural(list) => {
                    // selectors line up with the non-null items of the prop
                    let items = prop.as_list().unwrap_or(&[]);
                    let objects = items.iter().filter(|item| item.as_object().is_some());
                    PropSelector::Plural(
                        list.iter().zip(objects).map(|(s, item)| rebind(s, item)).collect(),
                    )
                }
            };
            if next != selector {
                self.subscribe_key(&key, prop, next);
            }
        }
    }

    /// Replace the external change callback
    pub fn set_callback(&mut self, callback: impl Fn() + Send + Sync + 'static) {
        self.shared.lock().callback = Some(Arc::new(callback));
    }

    /// Current data per fragment key
    ///
    /// Unsubscribed keys resolve to null. Pure: repeated calls without an
    /// intervening update return identity-equal data.
    pub fn resolve(&self) -> BTreeMap<String, Data> {
        let shared = self.shared.lock();
        shared
            .keys
            .iter()
            .map(|(key, state)| {
                let data = match state {
                    KeyState::Subscribed(s) => s.data.clone(),
                    KeyState::Unsubscribed => Data::Null,
                };
                (key.clone(), data)
            })
            .collect()
    }

    /// Whether any subscribed key is missing data
    pub fn is_missing_data(&self) -> bool {
        let shared = self.shared.lock();
        shared.keys.values().any(|state| match state {
            KeyState::Subscribed(s) => s.items.iter().any(|item| item.snapshot.is_missing_data),
            KeyState::Unsubscribed => false,
        })
    }

    /// Release every subscription; later calls do nothing
    pub fn dispose(&mut self) {
        let items: Vec<Item> = {
            let mut shared = self.shared.lock();
            if shared.disposed {
                return;
            }
            shared.disposed = true;
            shared.callback = None;
            shared.keys.values_mut().flat_map(KeyState::take_items).collect()
        };
        for item in &items {
            item.disposable.dispose();
        }
        debug!(target: "strata::resolver", released = items.len(), "Resolver disposed");
    }

    fn is_current(&self, key: &str, prop: &Data, selector: &PropSelector) -> bool {
        let shared = self.shared.lock();
        match shared.keys.get(key) {
            Some(KeyState::Subscribed(s)) => s.prop.same_identity(prop) || s.selector == *selector,
            _ => false,
        }
    }

    fn unsubscribe_key(&mut self, key: &str) {
        let items = {
            let mut shared = self.shared.lock();
            match shared.keys.get_mut(key) {
                Some(state) => state.take_items(),
                None => Vec::new(),
            }
        };
        if !items.is_empty() {
            trace!(target: "strata::resolver", key, "Unsubscribed key");
        }
        for item in items {
            item.disposable.dispose();
        }
    }

    fn subscribe_key(&mut self, key: &str, prop: Data, selector: PropSelector) {
        self.unsubscribe_key(key);
        let generation = {
            let mut shared = self.shared.lock();
            if shared.disposed {
                return;
            }
            shared.next_generation += 1;
            shared.next_generation
        };

        let mut items = Vec::new();
        for (index, item_selector) in selector.selectors().into_iter().enumerate() {
            let snapshot = self.environment.lookup(item_selector);
            let callback = item_callback(
                Arc::downgrade(&self.shared),
                self.environment.downgrade(),
                key.to_string(),
                generation,
                index,
            );
            let disposable = self.environment.subscribe(&snapshot, callback);
            let snapshot = self.environment.lookup(item_selector);
            items.push(Item {
                snapshot,
                disposable,
            });
        }

        let mut subscribed = Subscribed {
            prop,
            selector,
            generation,
            items,
            data: Data::Null,
        };
        subscribed.data = subscribed.project();
        trace!(target: "strata::resolver", key, items = subscribed.items.len(), "Subscribed key");
        self.shared
            .lock()
            .keys
            .insert(key.to_string(), KeyState::Subscribed(subscribed));
    }
}

/// Per-item subscription callback
///
/// Holds only weak handles so a live subscription never keeps the resolver
/// or the environment alive.
fn item_callback(
    shared: Weak<Mutex<ResolverShared>>,
    environment: WeakEnvironment,
    key: String,
    generation: u64,
    index: usize,
) -> impl Fn(&Snapshot) + Send + Sync + 'static {
    move |snapshot: &Snapshot| {
        let Some(state) = shared.upgrade() else {
            return;
        };
        let schedule = {
            let mut guard = state.lock();
            if guard.disposed {
                return;
            }
            let Some(KeyState::Subscribed(subscribed)) = guard.keys.get_mut(&key) else {
                return;
            };
            if subscribed.generation != generation {
                return;
            }
            let Some(item) = subscribed.items.get_mut(index) else {
                return;
            };
            item.snapshot = snapshot.clone();
            subscribed.data = subscribed.project();
            !std::mem::replace(&mut guard.notify_scheduled, true)
        };
        if schedule {
            let shared = shared.clone();
            environment.schedule_after_notify(Box::new(move || flush(&shared)));
        }
    }
}

fn flush(shared: &Weak<Mutex<ResolverShared>>) {
    let Some(state) = shared.upgrade() else {
        return;
    };
    let callback = {
        let mut guard = state.lock();
        guard.notify_scheduled = false;
        if guard.disposed {
            None
        } else {
            guard.callback.clone()
        }
    };
    if let Some(callback) = callback {
        callback();
    }
}

impl Drop for FragmentSpecResolver {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for FragmentSpecResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        let subscribed: Vec<&String> = shared
            .keys
            .iter()
            .filter(|(_, state)| matches!(state, KeyState::Subscribed(_)))
            .map(|(key, _)| key)
            .collect();
        f.debug_struct("FragmentSpecResolver")
            .field("fragments", &self.fragments.keys().collect::<Vec<_>>())
            .field("subscribed", &subscribed)
            .field("disposed", &shared.disposed)
            .finish()
    }
}

/// Arguments `fragment` was spread with on the object `item`
fn spread_arguments(item: &Data, fragment: &str) -> Variables {
    item.as_object()
        .and_then(|object| object.fragment_ref())
        .and_then(|fragment_ref| fragment_ref.arguments(fragment))
        .cloned()
        .unwrap_or_default()
}
