//! Shared fixtures for the integration suites.
//!
//! Import via `mod common;` from a suite's main.rs.

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use stratagraph::{
    create_operation_descriptor, CacheConfig, ConcreteRequest, DataId, Disposable, Environment,
    GraphQLResponse, Network, NormalizationNode, Observable, OfflineNetwork, OperationDescriptor,
    PayloadData, ReaderFragment, ReaderSelector, RequestParameters, Selection, Sink, Variables,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test harness once per binary
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Offline environment with default configuration
pub fn offline_env() -> Environment {
    init_tracing();
    Environment::new(OfflineNetwork)
}

/// JSON object literal as a payload
pub fn payload(value: serde_json::Value) -> PayloadData {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("payload must be an object, got {}", other),
    }
}

// ============================================================================
// Queries
// ============================================================================

/// `fragment UserProfile on User { name }`
pub fn user_profile() -> Arc<ReaderFragment> {
    Arc::new(ReaderFragment::new(
        "UserProfile",
        "User",
        vec![Selection::scalar("name")],
    ))
}

/// `query UserQuery { me { id name } }`
pub fn user_query() -> Arc<ConcreteRequest> {
    let selections = vec![Selection::linked(
        "me",
        vec![Selection::scalar("id"), Selection::scalar("name")],
    )];
    Arc::new(ConcreteRequest::query(
        ReaderFragment::new("UserQuery", "__Root", selections.clone()),
        NormalizationNode::new("UserQuery", selections),
    ))
}

/// `query FriendsQuery { me { id name friends { id name } } }`
pub fn friends_query() -> Arc<ConcreteRequest> {
    let selections = vec![Selection::linked(
        "me",
        vec![
            Selection::scalar("id"),
            Selection::scalar("name"),
            Selection::plural_linked("friends", vec![Selection::scalar("id"), Selection::scalar("name")]),
        ],
    )];
    Arc::new(ConcreteRequest::query(
        ReaderFragment::new("FriendsQuery", "__Root", selections.clone()),
        NormalizationNode::new("FriendsQuery", selections),
    ))
}

/// `query ProfileQuery { me { ...UserProfile } }`, normalizing `{ id name }`
pub fn profile_query() -> Arc<ConcreteRequest> {
    Arc::new(ConcreteRequest::query(
        ReaderFragment::new(
            "ProfileQuery",
            "__Root",
            vec![Selection::linked("me", vec![Selection::spread(user_profile())])],
        ),
        NormalizationNode::new(
            "ProfileQuery",
            vec![Selection::linked(
                "me",
                vec![Selection::scalar("id"), Selection::scalar("name")],
            )],
        ),
    ))
}

/// Descriptor of `request` with no variables
pub fn operation(request: Arc<ConcreteRequest>) -> OperationDescriptor {
    create_operation_descriptor(request, &Variables::new())
}

/// `{ id name }` read directly on a record
pub fn user_selector(id: &str) -> ReaderSelector {
    ReaderSelector::new(
        id,
        Arc::new(ReaderFragment::new(
            "UserFields",
            "User",
            vec![Selection::scalar("id"), Selection::scalar("name")],
        )),
        Variables::new(),
    )
}

/// Environment holding `{ me: { id: "4", name: "Zuck" } }`
pub fn zuck_env() -> (Environment, OperationDescriptor) {
    let env = offline_env();
    let op = operation(user_query());
    env.commit_payload(&op, &payload(json!({"me": {"id": "4", "name": "Zuck"}})))
        .expect("seed payload");
    (env, op)
}

/// Set `name` on an existing record
pub fn rename(env: &Environment, id: &str, name: &str) {
    env.commit_update(|proxy| proxy.set_value(&DataId::from(id), "name", name))
        .expect("rename");
}

/// Callback counter
pub fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + Clone + 'static) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    (calls, move || {
        counted.fetch_add(1, Ordering::SeqCst);
    })
}

// ============================================================================
// ManualNetwork - responses pushed by the test
// ============================================================================

/// Network whose requests stay open until the test drives them
#[derive(Clone, Default)]
pub struct ManualNetwork {
    sinks: Arc<Mutex<Vec<Sink<GraphQLResponse>>>>,
    requests: Arc<Mutex<Vec<(RequestParameters, Variables, CacheConfig)>>>,
    cancelled: Arc<AtomicUsize>,
}

impl ManualNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a payload on request `index`
    pub fn emit(&self, index: usize, data: serde_json::Value) {
        let sink = self.sinks.lock()[index].clone();
        sink.next(GraphQLResponse::from_data(data).expect("object payload"));
    }

    /// Emit a raw response on request `index`
    pub fn respond(&self, index: usize, response: GraphQLResponse) {
        let sink = self.sinks.lock()[index].clone();
        sink.next(response);
    }

    /// Complete request `index`
    pub fn complete(&self, index: usize) {
        let sink = self.sinks.lock()[index].clone();
        sink.complete();
    }

    /// Fail request `index`
    pub fn fail(&self, index: usize, message: &str) {
        let sink = self.sinks.lock()[index].clone();
        sink.error(stratagraph::StrataError::network(message));
    }

    /// Requests started so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Parameters of request `index`
    pub fn request(&self, index: usize) -> (RequestParameters, Variables, CacheConfig) {
        self.requests.lock()[index].clone()
    }

    /// Upstream cancellations seen
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Network for ManualNetwork {
    fn execute(
        &self,
        request: &RequestParameters,
        variables: &Variables,
        cache_config: &CacheConfig,
    ) -> Observable<GraphQLResponse> {
        let sinks = Arc::clone(&self.sinks);
        let requests = Arc::clone(&self.requests);
        let cancelled = Arc::clone(&self.cancelled);
        let params = (request.clone(), variables.clone(), cache_config.clone());
        Observable::create(move |sink| {
            requests.lock().push(params.clone());
            sinks.lock().push(sink);
            let cancelled = Arc::clone(&cancelled);
            Disposable::new(move || {
                cancelled.fetch_add(1, Ordering::SeqCst);
            })
        })
    }
}
