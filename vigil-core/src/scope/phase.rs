//! Digest phase tracking.
//!
//! A scope runs at most one digest at a time. Starting a digest enters the
//! phase and the returned guard leaves it on drop, so the flag is cleared
//! even when a deferred task panics out of the digest.

use std::cell::Cell;

use crate::error::DigestError;

/// Guard that marks a digest as running.
pub(crate) struct DigestPhase<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> DigestPhase<'a> {
    /// Enter the digest phase, failing if a digest is already running.
    pub(crate) fn enter(flag: &'a Cell<bool>) -> Result<Self, DigestError> {
        if flag.replace(true) {
            return Err(DigestError::InProgress);
        }
        Ok(Self { flag })
    }
}

impl Drop for DigestPhase<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
