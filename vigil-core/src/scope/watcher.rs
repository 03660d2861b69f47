//! Watcher types.
//!
//! A watcher pairs a *watch function* (what to observe) with a *listener*
//! (what to do when the observation changes), an equality mode, and the
//! value it saw last time.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::BoxError;
use crate::value::{values_equal, EqualityMode, Value};

use super::Scope;

/// Unique identifier for a watcher.
///
/// Removal locates watchers by this id, never by position, so a handle
/// stays valid however the registry shifts around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Generate a new unique watcher ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for WatcherId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watcher#{}", self.0)
    }
}

type WatchFn = Box<dyn Fn(&Scope) -> Result<Value, BoxError>>;
type ListenerFn = Box<dyn Fn(&Value, &Value, &Scope) -> Result<(), BoxError>>;

/// Everything needed to register a watcher.
///
/// ```rust
/// use vigil_core::{Scope, WatchSpec};
///
/// let scope = Scope::new();
/// scope.set("items", vigil_core::Value::array([1, 2]));
///
/// scope.register(
///     WatchSpec::new(|scope: &Scope| scope.get("items"))
///         .listener(|new, _old, scope| scope.set("count", new.as_array().map_or(0, |a| a.len())))
///         .deep(),
/// );
/// scope.digest().unwrap();
/// assert_eq!(scope.get("count").as_f64(), Some(2.0));
/// ```
pub struct WatchSpec {
    watch_fn: WatchFn,
    listener: Option<ListenerFn>,
    mode: EqualityMode,
}

impl WatchSpec {
    /// Watch the value returned by `watch_fn`.
    pub fn new<F, V>(watch_fn: F) -> Self
    where
        F: Fn(&Scope) -> V + 'static,
        V: Into<Value>,
    {
        Self::try_new(move |scope| Ok(watch_fn(scope).into()))
    }

    /// Watch a function that can fail. A failure skips this watcher for the
    /// current sweep without affecting the others.
    pub fn try_new<F>(watch_fn: F) -> Self
    where
        F: Fn(&Scope) -> Result<Value, BoxError> + 'static,
    {
        Self {
            watch_fn: Box::new(watch_fn),
            listener: None,
            mode: EqualityMode::Reference,
        }
    }

    /// Called with `(new, old, scope)` whenever the watched value changes.
    /// On the first change `old` is the same value as `new`.
    pub fn listener<L>(self, listener: L) -> Self
    where
        L: Fn(&Value, &Value, &Scope) + 'static,
    {
        self.try_listener(move |new, old, scope| {
            listener(new, old, scope);
            Ok(())
        })
    }

    /// Like [`listener`](Self::listener), for listeners that can fail.
    pub fn try_listener<L>(mut self, listener: L) -> Self
    where
        L: Fn(&Value, &Value, &Scope) -> Result<(), BoxError> + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Compare values structurally instead of by reference.
    pub fn deep(self) -> Self {
        self.equality(EqualityMode::Deep)
    }

    pub fn equality(mut self, mode: EqualityMode) -> Self {
        self.mode = mode;
        self
    }
}

impl fmt::Debug for WatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSpec")
            .field("has_listener", &self.listener.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

/// A registered watcher.
pub(crate) struct Watcher {
    id: WatcherId,
    watch_fn: WatchFn,
    listener: ListenerFn,
    mode: EqualityMode,

    /// The last recorded value. `None` until the first evaluation, which
    /// can therefore never compare equal to anything a watch produces.
    last: RefCell<Option<Value>>,

    /// Set once the watcher is removed. A sweep in progress may still hold
    /// it, and must skip it.
    removed: Cell<bool>,
}

impl Watcher {
    pub(crate) fn from_spec(spec: WatchSpec) -> Self {
        Self {
            id: WatcherId::new(),
            watch_fn: spec.watch_fn,
            listener: spec
                .listener
                .unwrap_or_else(|| Box::new(|_: &Value, _: &Value, _: &Scope| Ok(()))),
            mode: spec.mode,
            last: RefCell::new(None),
            removed: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> WatcherId {
        self.id
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.get()
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.set(true);
    }

    /// Run the watch function.
    pub(crate) fn evaluate(&self, scope: &Scope) -> Result<Value, BoxError> {
        (self.watch_fn)(scope)
    }

    /// Run the listener.
    pub(crate) fn notify(&self, new: &Value, old: &Value, scope: &Scope) -> Result<(), BoxError> {
        (self.listener)(new, old, scope)
    }

    /// Compare `new` with the recorded value and record it if it differs.
    ///
    /// Returns the old value to hand to the listener, or `None` when nothing
    /// changed. On the first observation the old value is `new` itself.
    /// Deep watchers record a deep clone so that in-place mutation of `new`
    /// shows up as a change next time.
    pub(crate) fn observe(&self, new: &Value) -> Option<Value> {
        let mut last = self.last.borrow_mut();
        if let Some(previous) = last.as_ref() {
            if values_equal(new, previous, self.mode) {
                return None;
            }
        }

        let recorded = match self.mode {
            EqualityMode::Reference => new.clone(),
            EqualityMode::Deep => new.deep_clone(),
        };
        let previous = last.replace(recorded);
        Some(previous.unwrap_or_else(|| new.clone()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_ids_are_unique() {
        let id1 = WatcherId::new();
        let id2 = WatcherId::new();
        let id3 = WatcherId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn first_observation_reports_new_value_as_old() {
        let watcher = Watcher::from_spec(WatchSpec::new(|_: &Scope| 123));

        let old = watcher.observe(&Value::from(123));
        assert_eq!(old, Some(Value::from(123)));
    }

    #[test]
    fn first_observation_of_undefined_is_a_change() {
        let watcher = Watcher::from_spec(WatchSpec::new(|_: &Scope| Value::Undefined));

        assert!(watcher.observe(&Value::Undefined).is_some());
        assert!(watcher.observe(&Value::Undefined).is_none());
    }

    #[test]
    fn reference_watcher_ignores_in_place_mutation() {
        let watcher = Watcher::from_spec(WatchSpec::new(|_: &Scope| Value::Undefined));
        let array = Value::array([1, 2]);

        assert!(watcher.observe(&array).is_some());
        array.as_array().unwrap().push(3);
        assert!(watcher.observe(&array).is_none());
    }

    #[test]
    fn deep_watcher_records_a_detached_copy() {
        let watcher = Watcher::from_spec(WatchSpec::new(|_: &Scope| Value::Undefined).deep());
        let array = Value::array([1, 2]);

        assert!(watcher.observe(&array).is_some());
        array.as_array().unwrap().push(3);

        let old = watcher.observe(&array).expect("mutation should be a change");
        assert_eq!(old, Value::array([1, 2]));
        assert!(watcher.observe(&array).is_none());
    }

    #[test]
    fn missing_listener_defaults_to_noop() {
        let watcher = Watcher::from_spec(WatchSpec::new(|_: &Scope| 1));
        let scope = Scope::new();

        assert!(watcher.notify(&Value::from(1), &Value::from(1), &scope).is_ok());
    }

    #[test]
    fn removal_flag() {
        let watcher = Watcher::from_spec(WatchSpec::new(|_: &Scope| 1));
        assert!(!watcher.is_removed());
        watcher.mark_removed();
        assert!(watcher.is_removed());
    }
}
