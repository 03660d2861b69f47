//! Scope configuration.

use serde::{Deserialize, Serialize};

/// Tunables for a [`Scope`](crate::scope::Scope).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use vigil_core::ScopeConfig;
///
/// let config = ScopeConfig::from_json(r#"{ "ttl": 20 }"#).unwrap();
/// assert_eq!(config.ttl, 20);
/// assert!(config.log_watcher_errors);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// How many extra digest iterations may still find the scope dirty
    /// before the digest gives up with a non-convergence error.
    pub ttl: usize,

    /// Emit a `tracing` error event for each isolated watcher failure.
    /// Failures are counted either way.
    ///
    /// A panicking watch function or listener also goes through the process
    /// panic hook before the digest catches it, and the default hook prints
    /// to stderr regardless of this flag. Replace the hook to silence it:
    ///
    /// ```rust
    /// use vigil_core::{Scope, ScopeConfig, Value, WatchSpec};
    ///
    /// std::panic::set_hook(Box::new(|_| {}));
    ///
    /// let scope = Scope::with_config(ScopeConfig::default().with_watcher_error_logging(false));
    /// scope.register(WatchSpec::new(|_: &Scope| -> Value { panic!("broken watch") }));
    ///
    /// scope.digest().unwrap();
    /// assert_eq!(scope.watcher_error_count(), 1);
    /// ```
    pub log_watcher_errors: bool,
}

impl ScopeConfig {
    pub const DEFAULT_TTL: usize = 10;

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_ttl(mut self, ttl: usize) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_watcher_error_logging(mut self, enabled: bool) -> Self {
        self.log_watcher_errors = enabled;
        self
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            ttl: Self::DEFAULT_TTL,
            log_watcher_errors: true,
        }
    }
}
