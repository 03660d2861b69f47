//! Scope Runtime
//!
//! The [`Scope`] is the shared mutable context that watchers observe. It
//! owns the user's properties, the watcher registry, the deferred task queue
//! and the bookkeeping the digest needs.
//!
//! # Entry Points
//!
//! - [`Scope::eval`] runs an expression against the scope. No digest.
//! - [`Scope::apply`] runs an expression and then digests, whether the
//!   expression returned, failed or panicked. This is how outside code
//!   should change scope state that observers care about.
//! - [`Scope::eval_async`] queues an expression for the running (or next)
//!   digest.
//!
//! # Sharing
//!
//! `Scope` is a cheap handle: clones share all state. Watch functions and
//! listeners receive the scope as an argument and should not capture a
//! clone of it, since the scope owns them and the capture would form a
//! reference cycle. [`WatchHandle`]s hold only a weak reference and are fine
//! to capture.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::config::ScopeConfig;
use crate::error::DigestError;
use crate::value::{Object, Value};

use super::deferred::DeferredQueue;
use super::registry::{Registry, WatchHandle};
use super::watcher::{WatchSpec, Watcher, WatcherId};

/// State shared by all clones of a scope.
pub(crate) struct ScopeInner {
    pub(crate) properties: Object,
    pub(crate) registry: Registry,
    pub(crate) deferred: DeferredQueue,

    /// The watcher that most recently reported a change. Reset at the start
    /// of every digest and whenever the registry changes.
    pub(crate) last_dirty: Cell<Option<WatcherId>>,

    pub(crate) digesting: Cell<bool>,
    pub(crate) watcher_errors: Cell<u64>,
    pub(crate) config: ScopeConfig,
}

/// A shared mutable context observed by watchers.
///
/// # Example
///
/// ```rust
/// use vigil_core::Scope;
///
/// let scope = Scope::new();
/// scope.set("name", "Jane");
///
/// scope.watch(
///     |scope: &Scope| scope.get("name"),
///     |name, _old, scope| {
///         let upper = name.as_str().unwrap_or_default().to_uppercase();
///         scope.set("upper", upper);
///     },
/// );
///
/// scope.apply(|scope| scope.set("name", "Bob")).unwrap();
/// assert_eq!(scope.get("upper").as_str(), Some("BOB"));
/// ```
#[derive(Clone)]
pub struct Scope {
    pub(crate) inner: Rc<ScopeInner>,
}

impl Scope {
    /// Create a scope with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ScopeConfig::default())
    }

    pub fn with_config(config: ScopeConfig) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                properties: Object::new(),
                registry: Registry::default(),
                deferred: DeferredQueue::default(),
                last_dirty: Cell::new(None),
                digesting: Cell::new(false),
                watcher_errors: Cell::new(0),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Read a property. Missing properties read as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        self.inner.properties.get(key)
    }

    /// Write a property. Watchers see the change on the next digest.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.properties.insert(key, value);
    }

    /// Replace a property with a value computed from its current one.
    pub fn update<F, V>(&self, key: &str, f: F)
    where
        F: FnOnce(Value) -> V,
        V: Into<Value>,
    {
        let next = f(self.get(key));
        self.set(key, next);
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.properties.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.properties.remove(key)
    }

    /// The property bag itself.
    pub fn properties(&self) -> &Object {
        &self.inner.properties
    }

    // ------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------

    /// Register a watcher.
    ///
    /// The watcher is evaluated on every digest until its handle is used to
    /// remove it. Its listener fires on the first digest even if the watched
    /// value is `Undefined`.
    pub fn register(&self, spec: WatchSpec) -> WatchHandle {
        let watcher = Rc::new(Watcher::from_spec(spec));
        let id = watcher.id();
        self.inner.registry.insert(watcher);
        self.inner.last_dirty.set(None);
        tracing::trace!(watcher = %id, "watcher registered");
        WatchHandle::new(id, Rc::downgrade(&self.inner))
    }

    /// Watch a value by reference.
    pub fn watch<W, V, L>(&self, watch_fn: W, listener: L) -> WatchHandle
    where
        W: Fn(&Scope) -> V + 'static,
        V: Into<Value>,
        L: Fn(&Value, &Value, &Scope) + 'static,
    {
        self.register(WatchSpec::new(watch_fn).listener(listener))
    }

    /// Watch a value structurally.
    pub fn watch_deep<W, V, L>(&self, watch_fn: W, listener: L) -> WatchHandle
    where
        W: Fn(&Scope) -> V + 'static,
        V: Into<Value>,
        L: Fn(&Value, &Value, &Scope) + 'static,
    {
        self.register(WatchSpec::new(watch_fn).listener(listener).deep())
    }

    /// Number of registered watchers.
    pub fn watcher_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Number of watch function or listener failures isolated so far.
    pub fn watcher_error_count(&self) -> u64 {
        self.inner.watcher_errors.get()
    }

    // ------------------------------------------------------------------
    // Eval / Apply
    // ------------------------------------------------------------------

    /// Run `expr` against this scope and return its result.
    pub fn eval<F, R>(&self, expr: F) -> R
    where
        F: FnOnce(&Scope) -> R,
    {
        expr(self)
    }

    /// Run `expr` against this scope with extra local arguments.
    pub fn eval_with<F, L, R>(&self, expr: F, locals: L) -> R
    where
        F: FnOnce(&Scope, L) -> R,
    {
        expr(self, locals)
    }

    /// Queue `expr` to run inside the current digest, or the next one if
    /// none is running. Its result is discarded.
    pub fn eval_async<F, R>(&self, expr: F)
    where
        F: FnOnce(&Scope) -> R + 'static,
    {
        self.inner.deferred.push(Box::new(move |scope: &Scope| {
            expr(scope);
        }));
    }

    /// Run `expr`, then digest.
    ///
    /// The digest runs on every exit path. If `expr` panics, the digest
    /// still runs and the panic is then resumed.
    pub fn apply<F, R>(&self, expr: F) -> Result<R, DigestError>
    where
        F: FnOnce(&Scope) -> R,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.eval(expr)));
        let digested = self.digest();
        match outcome {
            Ok(value) => digested.map(|()| value),
            Err(payload) => {
                if let Err(err) = digested {
                    tracing::error!(error = %err, "digest failed after apply expression panicked");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Run a fallible `expr`, then digest.
    ///
    /// The digest runs even when `expr` fails. A digest failure takes
    /// precedence over the expression's own error.
    pub fn try_apply<F, R, E>(&self, expr: F) -> Result<R, E>
    where
        F: FnOnce(&Scope) -> Result<R, E>,
        E: From<DigestError>,
    {
        self.apply(expr)?
    }

    /// Whether two handles refer to the same scope.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("properties", &self.inner.properties.keys())
            .field("watcher_count", &self.watcher_count())
            .field("pending_tasks", &self.inner.deferred.len())
            .field("digesting", &self.inner.digesting.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
