//! Environment: the façade over store, reader, subscriptions and retention
//!
//! # Design Notes
//!
//! - **One publish lock**: a reentrant mutex serializes commits, their
//!   notification passes, retains, releases and GC passes, so batches never
//!   interleave and a pass fully completes before the next one starts
//! - **Nested writes**: a write issued from inside a notification callback
//!   commits immediately but its notification pass is queued behind the
//!   current one
//! - **Reads are lock-light**: `lookup` and `check` take a store view and
//!   never touch the publish lock
//! - **GC holds**: collection is deferred while any hold is active; the last
//!   hold to go runs the deferred pass

use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use strata_core::{
    CacheConfig, DataId, Disposable, NormalizationSelector, OperationDescriptor, ReaderSelector,
    Snapshot, StrataError, StrataResult,
};
use strata_storage::{CommitResult, RecordStore, WriteBatch};

use crate::checker;
use crate::config::EnvironmentConfig;
use crate::gc::GcScheduler;
use crate::lookup_cache::LookupCache;
use crate::network::{GraphQLResponse, Network};
use crate::normalizer::{self, PayloadData};
use crate::observable::{Observable, Observer, Sink};
use crate::proxy::RecordSourceProxy;
use crate::reader;
use crate::recycle::recycle_nodes_into;
use crate::retention::{RetainToken, RetentionManager};
use crate::subscriptions::SubscriptionRegistry;

/// Custom merge logic run after a payload is normalized, in the same batch
pub type Updater =
    Arc<dyn Fn(&mut RecordSourceProxy<'_>, Option<&PayloadData>) -> StrataResult<()> + Send + Sync>;

type Task = Box<dyn FnOnce() + Send>;

/// Arguments of [`Environment::execute`]
#[derive(Clone)]
pub struct ExecuteRequest {
    /// Operation to run
    pub operation: OperationDescriptor,
    /// Passed through to the network
    pub cache_config: CacheConfig,
    /// Optional updater run on every payload
    pub updater: Option<Updater>,
}

impl ExecuteRequest {
    /// Request with default cache config and no updater
    pub fn new(operation: OperationDescriptor) -> Self {
        Self {
            operation,
            cache_config: CacheConfig::default(),
            updater: None,
        }
    }

    /// Set the cache config
    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.cache_config = cache_config;
        self
    }

    /// Set the updater
    pub fn with_updater(
        mut self,
        updater: impl Fn(&mut RecordSourceProxy<'_>, Option<&PayloadData>) -> StrataResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.updater = Some(Arc::new(updater));
        self
    }
}

/// Outcome of a garbage collection request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Records evicted
    pub evicted: usize,
    /// Store version after the pass
    pub version: u64,
    /// Whether the pass was deferred by an active GC hold
    pub deferred: bool,
}

#[derive(Default)]
struct PublishState {
    pending: VecDeque<HashSet<DataId>>,
    notifying: bool,
}

/// Clears the notifying flag when a pass loop ends, even by panic
struct NotifyingReset<'a> {
    state: &'a RefCell<PublishState>,
}

impl Drop for NotifyingReset<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().notifying = false;
    }
}

#[derive(Default)]
struct UpstreamState {
    cancelled: bool,
    subscription: Option<Disposable>,
}

/// Network subscription of one request, cancellable from its own callbacks
///
/// A cancel that lands before the subscription is attached disposes it on
/// attach.
#[derive(Default)]
struct UpstreamHandle {
    state: Mutex<UpstreamState>,
}

impl UpstreamHandle {
    fn attach(&self, subscription: Disposable) {
        let mut state = self.state.lock();
        if state.cancelled {
            drop(state);
            subscription.dispose();
        } else {
            state.subscription = Some(subscription);
        }
    }

    fn cancel(&self) {
        let subscription = {
            let mut state = self.state.lock();
            state.cancelled = true;
            state.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.dispose();
        }
    }
}

pub(crate) struct EnvironmentInner {
    store: Arc<RecordStore>,
    network: Arc<dyn Network>,
    config: EnvironmentConfig,
    subscriptions: Arc<SubscriptionRegistry>,
    retention: RetentionManager,
    publish: ReentrantMutex<RefCell<PublishState>>,
    post_notify: Mutex<Vec<Task>>,
    gc_holds: AtomicUsize,
    gc_pending: AtomicBool,
    lookup_cache: Mutex<LookupCache>,
    gc_scheduler: Mutex<Option<GcScheduler>>,
}

/// Handle to a graph cache environment
///
/// Cheap to clone; all clones share one store.
///
/// # Example
///
/// ```ignore
/// let env = Environment::new(OfflineNetwork);
/// let operation = create_operation_descriptor(query, &variables);
/// env.commit_payload(&operation, &payload)?;
/// let snapshot = env.lookup(&operation.fragment);
/// let _subscription = env.subscribe(&snapshot, |s| println!("{:?}", s.data));
/// ```
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvironmentInner>,
}

impl Environment {
    /// Environment with default configuration and an empty store
    pub fn new(network: impl Network + 'static) -> Self {
        Self::build(network, Arc::new(RecordStore::new()), EnvironmentConfig::default())
    }

    /// Environment with the given configuration and an empty store
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the configuration does not validate.
    pub fn with_config(network: impl Network + 'static, config: EnvironmentConfig) -> StrataResult<Self> {
        Self::with_store(network, Arc::new(RecordStore::new()), config)
    }

    /// Environment over an existing store
    pub fn with_store(
        network: impl Network + 'static,
        store: Arc<RecordStore>,
        config: EnvironmentConfig,
    ) -> StrataResult<Self> {
        config.validate()?;
        Ok(Self::build(network, store, config))
    }

    /// Environment configured from a `strata.toml` file
    pub fn from_config_file(network: impl Network + 'static, path: &Path) -> StrataResult<Self> {
        let config = EnvironmentConfig::from_file(path)?;
        Self::with_store(network, Arc::new(RecordStore::new()), config)
    }

    fn build(network: impl Network + 'static, store: Arc<RecordStore>, config: EnvironmentConfig) -> Self {
        let inner = Arc::new(EnvironmentInner {
            store,
            network: Arc::new(network),
            retention: RetentionManager::new(config.release_buffer_size),
            lookup_cache: Mutex::new(LookupCache::new(config.snapshot_cache_capacity)),
            config,
            subscriptions: SubscriptionRegistry::new(),
            publish: ReentrantMutex::new(RefCell::new(PublishState::default())),
            post_notify: Mutex::new(Vec::new()),
            gc_holds: AtomicUsize::new(0),
            gc_pending: AtomicBool::new(false),
            gc_scheduler: Mutex::new(None),
        });

        if let Some(interval) = inner.config.gc_interval() {
            let weak = Arc::downgrade(&inner);
            let scheduler = GcScheduler::start(interval, move || match weak.upgrade() {
                Some(inner) => {
                    inner.collect_garbage();
                    true
                }
                None => false,
            });
            *inner.gc_scheduler.lock() = Some(scheduler);
        }
        Self { inner }
    }

    /// The underlying record store
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.inner.store
    }

    /// Active configuration
    pub fn config(&self) -> &EnvironmentConfig {
        &self.inner.config
    }

    /// Whether every required field of `selector` is cached
    pub fn check(&self, selector: &NormalizationSelector) -> bool {
        checker::check(selector, &self.inner.store.view())
    }

    /// Read `selector` at the current store version
    ///
    /// Repeated lookups of an unchanged selector return identity-equal data;
    /// after a write, unchanged sub-trees keep their identity.
    pub fn lookup(&self, selector: &ReaderSelector) -> Snapshot {
        self.inner.lookup(selector)
    }

    /// Call `callback` whenever data read by `snapshot` changes
    pub fn subscribe(
        &self,
        snapshot: &Snapshot,
        callback: impl Fn(&Snapshot) + Send + Sync + 'static,
    ) -> Disposable {
        self.inner
            .subscriptions
            .subscribe(snapshot.clone(), Arc::new(callback))
    }

    /// Number of active subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.len()
    }

    /// Keep the records reachable from `selector` alive until disposed
    pub fn retain(&self, selector: &NormalizationSelector) -> Disposable {
        let token = {
            let _guard = self.inner.publish.lock();
            let view = self.inner.store.view();
            self.inner.retention.retain(selector.clone(), &view)
        };
        let weak = Arc::downgrade(&self.inner);
        Disposable::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.release(token);
            }
        })
    }

    /// Current retain count of a DataID
    pub fn retain_count(&self, id: &DataId) -> usize {
        self.inner.retention.count(id)
    }

    /// Defer garbage collection until the returned disposable is disposed
    pub fn hold_gc(&self) -> Disposable {
        self.inner.hold_gc()
    }

    /// Evict every record that is not retained
    ///
    /// Deferred (and reported as such) while a GC hold is active.
    pub fn collect_garbage(&self) -> GcReport {
        self.inner.collect_garbage()
    }

    /// Normalize `payload` for `operation` and commit it
    pub fn commit_payload(
        &self,
        operation: &OperationDescriptor,
        payload: &PayloadData,
    ) -> StrataResult<CommitResult> {
        self.inner.commit_payload(operation, payload, None)
    }

    /// Run a local update against the current records and commit it
    pub fn commit_update<F>(&self, updater: F) -> StrataResult<CommitResult>
    where
        F: FnOnce(&mut RecordSourceProxy<'_>) -> StrataResult<()>,
    {
        let _guard = self.inner.publish.lock();
        let view = self.inner.store.view();
        let mut proxy = RecordSourceProxy::new(&view);
        updater(&mut proxy)?;
        let batch = proxy.into_batch();
        self.inner.commit(batch)
    }

    /// Fetch `request.operation` from the network and write every payload
    ///
    /// Nothing happens until the result is subscribed; each subscription is
    /// an independent request. Payloads are re-emitted after they are
    /// committed. GC is held while the request is in flight.
    pub fn execute(&self, request: ExecuteRequest) -> Observable<GraphQLResponse> {
        let inner = Arc::clone(&self.inner);
        Observable::create(move |sink: Sink<GraphQLResponse>| inner.start_request(&request, sink))
    }

    pub(crate) fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment(Arc::downgrade(&self.inner))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("version", &self.inner.store.current_version())
            .field("records", &self.inner.store.len())
            .field("subscriptions", &self.inner.subscriptions.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Non-owning environment handle for callbacks stored inside the environment
#[derive(Clone)]
pub(crate) struct WeakEnvironment(Weak<EnvironmentInner>);

impl WeakEnvironment {
    pub(crate) fn schedule_after_notify(&self, task: Task) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule_after_notify(task);
        }
    }
}

impl EnvironmentInner {
    fn lookup(&self, selector: &ReaderSelector) -> Snapshot {
        let view = self.store.view();
        let key = selector.cache_key();
        let previous = {
            let cache = self.lookup_cache.lock();
            if cache.is_enabled() {
                cache.get(&key).cloned()
            } else {
                None
            }
        };
        if let Some((version, snapshot)) = &previous {
            if *version == view.version() && snapshot.selector == *selector {
                return snapshot.clone();
            }
        }

        let fresh = reader::read(selector, &view);
        let snapshot = match previous {
            Some((_, prev)) if prev.selector == *selector => Snapshot {
                data: recycle_nodes_into(&prev.data, fresh.data),
                ..fresh
            },
            _ => fresh,
        };
        self.lookup_cache
            .lock()
            .insert(key, view.version(), snapshot.clone());
        snapshot
    }

    fn commit(&self, batch: WriteBatch) -> StrataResult<CommitResult> {
        let _guard = self.publish.lock();
        let result = self.store.apply_batch(batch)?;
        if !result.changed.is_empty() {
            self.publish_changes(result.changed.clone());
        }
        Ok(result)
    }

    fn commit_payload(
        &self,
        operation: &OperationDescriptor,
        payload: &PayloadData,
        updater: Option<&Updater>,
    ) -> StrataResult<CommitResult> {
        let _guard = self.publish.lock();
        let mut batch = WriteBatch::new();
        normalizer::normalize(&operation.root, payload, &mut batch)?;
        if let Some(updater) = updater {
            let view = self.store.view();
            let mut proxy = RecordSourceProxy::new(&view);
            proxy.stage_batch(&batch)?;
            updater(&mut proxy, Some(payload))?;
            batch = proxy.into_batch();
        }
        self.commit(batch)
    }

    /// Run notification passes for `changed` and anything queued behind it
    fn publish_changes(&self, changed: HashSet<DataId>) {
        let guard = self.publish.lock();
        {
            let mut state = guard.borrow_mut();
            state.pending.push_back(changed);
            if state.notifying {
                return;
            }
            state.notifying = true;
        }
        let _reset = NotifyingReset { state: &*guard };
        loop {
            let next = guard.borrow_mut().pending.pop_front();
            let Some(changed) = next else {
                break;
            };
            let view = self.store.view();
            self.subscriptions.notify(&view, &changed);
            self.run_post_notify_tasks();
        }
    }

    fn run_post_notify_tasks(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.post_notify.lock());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                task();
            }
        }
    }

    fn schedule_after_notify(&self, task: Task) {
        let guard = self.publish.lock();
        let notifying = guard.borrow().notifying;
        if notifying {
            self.post_notify.lock().push(task);
            return;
        }
        drop(guard);
        task();
    }

    fn release(&self, token: RetainToken) {
        let _guard = self.publish.lock();
        let dropped = self.retention.release(token);
        if dropped && self.config.gc_on_release {
            self.collect_garbage();
        }
    }

    fn hold_gc(self: &Arc<Self>) -> Disposable {
        self.gc_holds.fetch_add(1, Ordering::SeqCst);
        let weak = Arc::downgrade(self);
        Disposable::new(move || {
            if let Some(inner) = weak.upgrade() {
                // Same lock as the deferral in collect_garbage, so a pass
                // deferred by this hold is always seen here
                let _guard = inner.publish.lock();
                let previous = inner.gc_holds.fetch_sub(1, Ordering::SeqCst);
                if previous == 1 && inner.gc_pending.swap(false, Ordering::SeqCst) {
                    inner.collect_garbage();
                }
            }
        })
    }

    fn collect_garbage(&self) -> GcReport {
        let _guard = self.publish.lock();
        if self.gc_holds.load(Ordering::SeqCst) > 0 {
            self.gc_pending.store(true, Ordering::SeqCst);
            debug!(target: "strata::gc", "Collection deferred by active hold");
            return GcReport {
                evicted: 0,
                version: self.store.current_version(),
                deferred: true,
            };
        }

        let result = self.store.evict_unmarked(|source| self.retention.mark(source));
        let report = GcReport {
            evicted: result.changed.len(),
            version: result.version,
            deferred: false,
        };
        info!(
            target: "strata::gc",
            evicted = report.evicted,
            version = report.version,
            "Collected garbage"
        );
        if !result.changed.is_empty() {
            self.publish_changes(result.changed);
        }
        report
    }

    fn start_request(self: &Arc<Self>, request: &ExecuteRequest, sink: Sink<GraphQLResponse>) -> Disposable {
        let operation = request.operation.clone();
        let name = operation.node().name().to_string();
        debug!(target: "strata::network", operation = %name, "Executing request");

        let hold = Arc::new(self.hold_gc());
        let cancel = Arc::new(UpstreamHandle::default());
        let upstream = self.network.execute(
            &operation.node().params,
            operation.variables(),
            &request.cache_config,
        );

        let on_next = {
            let inner = Arc::clone(self);
            let sink = sink.clone();
            let hold = Arc::clone(&hold);
            let cancel = Arc::clone(&cancel);
            let updater = request.updater.clone();
            let name = name.clone();
            move |response: GraphQLResponse| {
                if sink.is_closed() {
                    return;
                }
                match inner.process_response(&operation, &response, updater.as_ref()) {
                    Ok(()) => sink.next(response),
                    Err(error) => {
                        warn!(target: "strata::network", operation = %name, error = %error, "Failed to process response");
                        hold.dispose();
                        sink.error(error);
                        cancel.cancel();
                    }
                }
            }
        };
        let on_error = {
            let sink = sink.clone();
            let hold = Arc::clone(&hold);
            let name = name.clone();
            move |error: StrataError| {
                warn!(target: "strata::network", operation = %name, error = %error, "Request failed");
                hold.dispose();
                sink.error(error);
            }
        };
        let on_complete = {
            let hold = Arc::clone(&hold);
            move || {
                debug!(target: "strata::network", operation = %name, "Request completed");
                hold.dispose();
                sink.complete();
            }
        };

        cancel.attach(upstream.subscribe(
            Observer::new()
                .on_next(on_next)
                .on_error(on_error)
                .on_complete(on_complete),
        ));
        Disposable::new(move || {
            cancel.cancel();
            hold.dispose();
        })
    }

    fn process_response(
        &self,
        operation: &OperationDescriptor,
        response: &GraphQLResponse,
        updater: Option<&Updater>,
    ) -> StrataResult<()> {
        let Some(data) = &response.data else {
            let message = response
                .error_summary()
                .unwrap_or_else(|| "response carried no data".to_string());
            return Err(StrataError::network(message));
        };
        if let Some(summary) = response.error_summary() {
            warn!(target: "strata::network", errors = %summary, "Response carried partial errors");
        }
        self.commit_payload(operation, data, updater).map(|_| ())
    }
}
