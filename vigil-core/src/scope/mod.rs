//! Scopes and the Digest
//!
//! This module implements dirty checking: callers register watchers on a
//! shared [`Scope`], and a digest re-evaluates them until no watched value
//! changes.
//!
//! # Concepts
//!
//! ## Scope
//!
//! A bag of untyped properties plus everything the digest needs. Scopes are
//! created explicitly and live as long as some handle to them does.
//!
//! ## Watchers
//!
//! A watcher is a watch function (`&Scope -> Value`), a listener
//! (`(new, old, &Scope)`) and an equality mode. The listener fires whenever
//! the watch function's result differs from the previous one, and once on
//! the first digest. Registration returns a [`WatchHandle`] for removal.
//!
//! ## Digest
//!
//! [`Scope::digest`] sweeps all watchers repeatedly until a sweep finds no
//! change and no deferred work is queued. Listeners may change properties,
//! queue work with [`Scope::eval_async`] and add or remove watchers while
//! the digest runs.
//!
//! # Implementation Notes
//!
//! Nothing here is thread-safe or asynchronous: watch functions, listeners
//! and deferred tasks run one at a time on the calling thread. There is no
//! dependency tracking either; every digest re-runs every watch function.

mod deferred;
mod digest;
mod phase;
mod registry;
mod runtime;
mod watcher;

pub use registry::WatchHandle;
pub use runtime::Scope;
pub use watcher::{WatchSpec, WatcherId};
