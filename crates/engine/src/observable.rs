//! Lazy, cancellable multi-value producer
//!
//! An [`Observable`] does nothing until subscribed. Each subscription runs
//! the producer function once with a fresh [`Sink`]; the producer emits
//! values and then completes or errors. Disposing the returned
//! [`Disposable`] closes the sink (no further callbacks) and runs the
//! producer's cleanup. Disposing after completion is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use strata_core::{Disposable, StrataError};

type NextFn<T> = Box<dyn Fn(T) + Send + Sync>;
type ErrorFn = Box<dyn Fn(StrataError) + Send + Sync>;
type CompleteFn = Box<dyn Fn() + Send + Sync>;
type ProducerFn<T> = dyn Fn(Sink<T>) -> Disposable + Send + Sync;

/// Callbacks receiving an observable's events
pub struct Observer<T> {
    next: Option<NextFn<T>>,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
}

impl<T> Observer<T> {
    /// Observer that ignores every event
    pub fn new() -> Self {
        Self {
            next: None,
            error: None,
            complete: None,
        }
    }

    /// Handle each value
    pub fn on_next(mut self, f: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.next = Some(Box::new(f));
        self
    }

    /// Handle the terminal error
    pub fn on_error(mut self, f: impl Fn(StrataError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Handle completion
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }
}

impl<T> Default for Observer<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct SinkInner<T> {
    observer: Observer<T>,
    closed: AtomicBool,
}

/// Producer side of one subscription
///
/// Events after `error`, `complete` or disposal are dropped.
pub struct Sink<T> {
    inner: Arc<SinkInner<T>>,
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Sink<T> {
    fn new(observer: Observer<T>) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                observer,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Emit a value
    pub fn next(&self, value: T) {
        if self.is_closed() {
            return;
        }
        if let Some(next) = &self.inner.observer.next {
            next(value);
        }
    }

    /// Terminate with an error
    pub fn error(&self, error: StrataError) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(on_error) = &self.inner.observer.error {
            on_error(error);
        }
    }

    /// Terminate successfully
    pub fn complete(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(complete) = &self.inner.observer.complete {
            complete();
        }
    }

    /// Whether the subscription has terminated or been disposed
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

/// Lazy producer of values of type `T`
pub struct Observable<T> {
    producer: Arc<ProducerFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Observable running `producer` once per subscription
    ///
    /// The producer returns the cleanup to run on disposal.
    pub fn create(producer: impl Fn(Sink<T>) -> Disposable + Send + Sync + 'static) -> Self {
        Self {
            producer: Arc::new(producer),
        }
    }

    /// Emit the given values then complete
    pub fn from_values(values: Vec<T>) -> Self
    where
        T: Clone + Sync,
    {
        Self::create(move |sink| {
            for value in &values {
                if sink.is_closed() {
                    break;
                }
                sink.next(value.clone());
            }
            sink.complete();
            Disposable::noop()
        })
    }

    /// Fail immediately
    pub fn from_error(error: StrataError) -> Self {
        Self::create(move |sink| {
            sink.error(error.clone());
            Disposable::noop()
        })
    }

    /// Start the producer
    pub fn subscribe(&self, observer: Observer<T>) -> Disposable {
        let sink = Sink::new(observer);
        let cleanup = (self.producer)(sink.clone());
        Disposable::new(move || {
            sink.close();
            cleanup.dispose();
        })
    }
}
