//! Disposable resource handles
//!
//! Subscriptions, retains, GC holds and `execute()` subscriptions all hand out
//! a [`Disposable`]. Whoever receives one owns releasing it; releasing is
//! idempotent. Dropping a handle does NOT release the resource.

use parking_lot::Mutex;
use std::fmt;

type DisposeAction = Box<dyn FnOnce() + Send>;

/// Capability to release an acquired resource exactly once
pub struct Disposable {
    action: Mutex<Option<DisposeAction>>,
}

impl Disposable {
    /// Wrap a release action
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// A handle with nothing to release
    pub fn noop() -> Self {
        Self {
            action: Mutex::new(None),
        }
    }

    /// Release every handle in order, as one handle
    pub fn all(disposables: Vec<Disposable>) -> Self {
        Self::new(move || {
            for disposable in &disposables {
                disposable.dispose();
            }
        })
    }

    /// Release the resource; later calls do nothing
    pub fn dispose(&self) {
        // Take first so the action runs without the lock held; it may
        // dispose other handles or re-enter the owner.
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    /// Whether the resource has been released
    pub fn is_disposed(&self) -> bool {
        self.action.lock().is_none()
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
