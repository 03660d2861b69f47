//! Error types.
//!
//! Only two kinds of failure ever reach the code that called into a scope:
//! a [`DigestError`] from the digest itself, and whatever error the caller's
//! own expression produced. Failures inside watch functions and listeners
//! are isolated by the digest and reported through `tracing` instead.

use thiserror::Error;

/// Error type returned by fallible watch functions and listeners.
pub type BoxError = Box<dyn std::error::Error>;

/// A digest could not run to completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// The scope was still dirty (or had deferred work queued) after the
    /// configured number of iterations. Usually two watchers keep changing
    /// each other's inputs.
    #[error("{ttl} digest iterations reached")]
    NonConvergence { ttl: usize },

    /// A digest was started from inside a running digest on the same scope.
    #[error("digest already in progress")]
    InProgress,
}
