//! Per-job cleanup stack.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;

use tracing::{debug, error};

type Cleanup = Box<dyn FnOnce() + Send>;

/// LIFO stack of cleanup callbacks tied to one job.
///
/// [`ResourceStack::close`] runs every registered callback, newest first.
/// A panicking callback is logged and does not stop the others. Dropping an
/// unclosed stack closes it, so resources are released even if the job's
/// task is aborted.
#[derive(Default)]
pub struct ResourceStack {
    entries: Mutex<Vec<(String, Cleanup)>>,
    closed: Mutex<bool>,
}

impl ResourceStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cleanup` under `label`.
    ///
    /// On a stack that is already closed the callback runs immediately.
    pub fn push(&self, label: impl Into<String>, cleanup: impl FnOnce() + Send + 'static) {
        let label = label.into();
        if *lock(&self.closed) {
            debug!(resource = %label, "Resource stack already closed, releasing immediately");
            run_cleanup(&label, Box::new(cleanup));
            return;
        }
        lock(&self.entries).push((label, Box::new(cleanup)));
    }

    /// Number of callbacks still registered.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`ResourceStack::close`] has run.
    pub fn is_closed(&self) -> bool {
        *lock(&self.closed)
    }

    /// Run every callback in reverse registration order. Returns how many ran.
    pub fn close(&self) -> usize {
        *lock(&self.closed) = true;
        let entries = std::mem::take(&mut *lock(&self.entries));
        let count = entries.len();
        for (label, cleanup) in entries.into_iter().rev() {
            run_cleanup(&label, cleanup);
        }
        count
    }
}

impl Drop for ResourceStack {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ResourceStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = lock(&self.entries)
            .iter()
            .map(|(label, _)| label.clone())
            .collect();
        f.debug_struct("ResourceStack")
            .field("entries", &labels)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn run_cleanup(label: &str, cleanup: Cleanup) {
    if catch_unwind(AssertUnwindSafe(cleanup)).is_err() {
        error!(resource = %label, "Resource cleanup panicked");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
