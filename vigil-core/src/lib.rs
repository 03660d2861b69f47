//! Vigil Core
//!
//! This crate provides the change-detection engine for the Vigil reactive
//! framework. It implements:
//!
//! - A dynamic value model for untyped scope state
//! - Reference and deep equality
//! - Scopes with watchers, a dirty-checking digest and deferred tasks
//! - Eval/apply entry points that guarantee a digest follows a change
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: `Value`, its shared containers, and the equality engine
//! - `scope`: the `Scope` handle, watcher registry and digest loop
//! - `config`: scope configuration
//! - `error`: error types surfaced to callers
//!
//! # Example
//!
//! ```rust
//! use vigil_core::Scope;
//!
//! let scope = Scope::new();
//! scope.set("counter", 0);
//!
//! scope.watch(
//!     |scope: &Scope| scope.get("counter"),
//!     |new, _old, scope| {
//!         let doubled = new.as_f64().unwrap_or_default() * 2.0;
//!         scope.set("doubled", doubled);
//!     },
//! );
//!
//! scope.apply(|scope| scope.set("counter", 5)).unwrap();
//! assert_eq!(scope.get("doubled").as_f64(), Some(10.0));
//! ```

pub mod config;
pub mod error;
pub mod scope;
pub mod value;

pub use config::ScopeConfig;
pub use error::{BoxError, DigestError};
pub use scope::{Scope, WatchHandle, WatchSpec, WatcherId};
pub use value::{Array, EqualityMode, Object, Value};
