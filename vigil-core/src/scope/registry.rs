//! Watcher Registry
//!
//! Holds a scope's watchers in registration order and lets them be added or
//! removed while a sweep is walking over them.
//!
//! # Mutation During a Sweep
//!
//! A sweep walks the live list with an index cursor (see [`Sweep`]) rather
//! than a borrowed iterator, so callbacks are free to touch the registry:
//!
//! - removal only *marks* a watcher while a sweep is running, so no entry
//!   shifts under the cursor. Marked watchers are skipped and compacted away
//!   when the sweep ends.
//! - registration appends, so a watcher added mid-sweep is reached by the
//!   same cursor before the sweep finishes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::ScopeInner;
use super::watcher::{Watcher, WatcherId};

#[derive(Default)]
pub(crate) struct Registry {
    entries: RefCell<Vec<Rc<Watcher>>>,
    sweeping: Cell<bool>,
}

impl Registry {
    pub(crate) fn insert(&self, watcher: Rc<Watcher>) {
        self.entries.borrow_mut().push(watcher);
    }

    /// Remove the watcher with the given id.
    ///
    /// Returns `false` if it was already removed.
    pub(crate) fn remove(&self, id: WatcherId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let Some(index) = entries
            .iter()
            .position(|w| w.id() == id && !w.is_removed())
        else {
            return false;
        };

        entries[index].mark_removed();
        if !self.sweeping.get() {
            entries.remove(index);
        }
        true
    }

    /// Number of live watchers.
    pub(crate) fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|w| !w.is_removed())
            .count()
    }

    /// Start walking the registry.
    ///
    /// Sweeps do not nest; the digest phase guard already rules that out.
    pub(crate) fn sweep(&self) -> Sweep<'_> {
        self.sweeping.set(true);
        Sweep {
            registry: self,
            cursor: 0,
        }
    }

    fn get(&self, index: usize) -> Option<Rc<Watcher>> {
        self.entries.borrow().get(index).cloned()
    }

    fn compact(&self) {
        self.entries.borrow_mut().retain(|w| !w.is_removed());
    }
}

/// Cursor over the live watchers, oldest first.
///
/// The registry is re-read on every step and no borrow is held between
/// steps, so watchers added during the walk are still visited and removed
/// ones are skipped. Dropping the cursor ends the sweep.
pub(crate) struct Sweep<'a> {
    registry: &'a Registry,
    cursor: usize,
}

impl Iterator for Sweep<'_> {
    type Item = Rc<Watcher>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let watcher = self.registry.get(self.cursor)?;
            self.cursor += 1;
            if !watcher.is_removed() {
                return Some(watcher);
            }
        }
    }
}

impl Drop for Sweep<'_> {
    fn drop(&mut self) {
        self.registry.sweeping.set(false);
        self.registry.compact();
    }
}

/// Handle returned when a watcher is registered.
///
/// The handle does not keep the scope alive and does not remove the watcher
/// when dropped; call [`remove`](Self::remove).
#[derive(Clone)]
pub struct WatchHandle {
    id: WatcherId,
    scope: Weak<ScopeInner>,
}

impl WatchHandle {
    pub(crate) fn new(id: WatcherId, scope: Weak<ScopeInner>) -> Self {
        Self { id, scope }
    }

    pub fn id(&self) -> WatcherId {
        self.id
    }

    /// Stop this watcher from being evaluated.
    ///
    /// Safe to call from inside any watch function or listener, including
    /// the watcher's own. Returns `false` when the watcher was already gone.
    pub fn remove(&self) -> bool {
        let Some(scope) = self.scope.upgrade() else {
            return false;
        };
        let removed = scope.registry.remove(self.id);
        if removed {
            scope.last_dirty.set(None);
            tracing::trace!(watcher = %self.id, "watcher removed");
        }
        removed
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle").field("id", &self.id).finish()
    }
}
