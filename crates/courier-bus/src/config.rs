//! Bus configuration.

use std::env;
use std::time::Duration;

/// Timeout applied by `request`, `request_with_context` and the async
/// variants when the caller does not pass one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the request/response bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Default request timeout.
    pub default_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl BusConfig {
    /// Read `COURIER_DEFAULT_TIMEOUT_MS`, falling back to 30 s when unset,
    /// unparsable or zero.
    pub fn from_env() -> Self {
        let default_timeout = env::var("COURIER_DEFAULT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Self { default_timeout }
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}
