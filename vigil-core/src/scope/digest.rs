//! Digest Loop
//!
//! The digest re-evaluates every watcher until nothing changes.
//!
//! # Algorithm
//!
//! One digest is a loop of iterations. Each iteration:
//!
//! 1. Drains the deferred task queue, running each task against the scope.
//! 2. Sweeps the registry once ("digest once"), oldest watcher first:
//!    - evaluate the watch function;
//!    - if the value differs from the recorded one, record it, remember the
//!      watcher as the last dirty one, run the listener and mark the sweep
//!      dirty;
//!    - if the value is unchanged and this watcher is the last dirty one,
//!      stop the sweep: every watcher since its last change has been seen
//!      clean, and the ones after it were seen clean in the previous sweep.
//! 3. Stops when the sweep was clean and the queue is empty.
//!
//! Each iteration that leaves the scope dirty or the queue non-empty spends
//! one unit of the TTL (10 by default). Once the TTL is spent, the next
//! dirty iteration fails with [`DigestError::NonConvergence`].
//!
//! # Failure Isolation
//!
//! A watch function or listener that returns an error or panics is reported
//! through `tracing` and counted, and the sweep moves on to the next
//! watcher. Deferred tasks are not isolated: a panic in one leaves the
//! digest.
//!
//! A caught panic has already gone through the process panic hook, so the
//! default hook still prints it to stderr even when
//! [`ScopeConfig::log_watcher_errors`](crate::ScopeConfig::log_watcher_errors)
//! is off. Install a quieter hook with [`std::panic::set_hook`] to silence it.
//!
//! # Re-entrancy
//!
//! Calling [`Scope::digest`] (or [`Scope::apply`]) from inside a running
//! digest on the same scope returns [`DigestError::InProgress`] without
//! touching any state.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{BoxError, DigestError};

use super::phase::DigestPhase;
use super::watcher::WatcherId;
use super::Scope;

/// Which user callback failed.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Watch,
    Listener,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Watch => "watch",
            Stage::Listener => "listener",
        }
    }
}

impl Scope {
    /// Run watchers until the scope settles.
    ///
    /// Every listener whose watched value changed fires exactly once per
    /// change. Deferred tasks queued before or during the digest have all
    /// run by the time this returns.
    pub fn digest(&self) -> Result<(), DigestError> {
        let _phase = DigestPhase::enter(&self.inner.digesting)?;
        let ttl = self.inner.config.ttl;
        let mut remaining = ttl;
        let mut iterations = 0usize;

        self.inner.last_dirty.set(None);
        tracing::debug!(watchers = self.watcher_count(), "digest started");

        loop {
            self.drain_deferred();
            let dirty = self.digest_once();
            iterations += 1;

            let pending = !self.inner.deferred.is_empty();
            tracing::trace!(iteration = iterations, dirty, pending, "digest iteration");
            if !dirty && !pending {
                break;
            }

            if remaining == 0 {
                tracing::warn!(ttl, "digest did not converge");
                return Err(DigestError::NonConvergence { ttl });
            }
            remaining -= 1;
        }

        tracing::debug!(iterations, "digest finished");
        Ok(())
    }

    /// Run queued tasks in order, including ones queued while draining.
    fn drain_deferred(&self) {
        while let Some(task) = self.inner.deferred.pop() {
            self.eval(task);
        }
    }

    /// One sweep over the registry. Returns whether any watcher was dirty.
    fn digest_once(&self) -> bool {
        let mut dirty = false;

        for watcher in self.inner.registry.sweep() {
            let id = watcher.id();
            let Some(new_value) = self.isolate(id, Stage::Watch, || watcher.evaluate(self)) else {
                continue;
            };
            // Removed by its own watch function.
            if watcher.is_removed() {
                continue;
            }

            match watcher.observe(&new_value) {
                Some(old_value) => {
                    self.inner.last_dirty.set(Some(id));
                    tracing::trace!(watcher = %id, "watcher dirty");
                    self.isolate(id, Stage::Listener, || {
                        watcher.notify(&new_value, &old_value, self)
                    });
                    dirty = true;
                }
                None if self.inner.last_dirty.get() == Some(id) => break,
                None => {}
            }
        }

        dirty
    }

    /// Run one user callback, turning an error or panic into a report.
    fn isolate<T>(
        &self,
        id: WatcherId,
        stage: Stage,
        callback: impl FnOnce() -> Result<T, BoxError>,
    ) -> Option<T> {
        let failure = match panic::catch_unwind(AssertUnwindSafe(callback)) {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        let errors = &self.inner.watcher_errors;
        errors.set(errors.get() + 1);
        if self.inner.config.log_watcher_errors {
            tracing::error!(watcher = %id, stage = stage.as_str(), error = %failure, "watcher failed");
        }
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
