//! Background garbage collection scheduler
//!
//! Runs a collection pass on a fixed period in a background thread.
//!
//! # Design Notes
//!
//! - The pass is a closure returning `false` once its environment is gone;
//!   the thread then exits on its own
//! - Graceful shutdown via atomic flag, checked every 100ms
//! - Dropping the scheduler signals shutdown without joining, so the last
//!   environment handle may be dropped from inside a pass

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Periodic GC task
pub struct GcScheduler {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl GcScheduler {
    /// Start running `pass` every `interval`
    ///
    /// The first pass runs one interval after start.
    pub fn start<F>(interval: Duration, pass: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let spawned = thread::Builder::new()
            .name("strata-gc".to_string())
            .spawn(move || {
                debug!(target: "strata::gc", interval_ms = interval.as_millis() as u64, "GC scheduler started");
                while !flag.load(Ordering::Relaxed) {
                    let deadline = Instant::now() + interval;
                    while !flag.load(Ordering::Relaxed) {
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        thread::sleep((deadline - now).min(SHUTDOWN_POLL));
                    }
                    if flag.load(Ordering::Relaxed) {
                        break;
                    }
                    if !pass() {
                        break;
                    }
                }
                debug!(target: "strata::gc", "GC scheduler stopped");
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(target: "strata::gc", error = %e, "Failed to start GC scheduler");
                None
            }
        };
        Self { shutdown, handle }
    }

    /// Signal the thread to stop after the current pass
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Signal shutdown and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(target: "strata::gc", "GC scheduler thread panicked");
            }
        }
    }

    /// Whether the background thread is still running
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for GcScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
