//! Per-call options and resolution reporting

use herd_foundation::CoordinatorConfig;
use std::time::Duration;

/// Options recognized by [`RequestCoordinator::execute`](crate::RequestCoordinator::execute)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Skip cache, in-flight join and throttle; always dispatch
    pub force: bool,

    /// How long a successful result is served without dispatching
    pub ttl: Duration,

    /// Minimum spacing between dispatches for one key while a stale value exists
    pub throttle: Duration,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self::from(&CoordinatorConfig::default())
    }
}

impl From<&CoordinatorConfig> for ExecuteOptions {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            force: false,
            ttl: config.ttl(),
            throttle: config.throttle(),
        }
    }
}

impl ExecuteOptions {
    pub fn new(ttl: Duration, throttle: Duration) -> Self {
        Self {
            force: false,
            ttl,
            throttle,
        }
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl_ms(self, ms: u64) -> Self {
        self.ttl(Duration::from_millis(ms))
    }

    pub fn throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn throttle_ms(self, ms: u64) -> Self {
        self.throttle(Duration::from_millis(ms))
    }
}

/// Which branch of the resolution algorithm produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Fresh cache entry, no call made
    CacheHit,
    /// Joined a call that was already in flight
    Joined,
    /// Stale cache entry returned inside the throttle window
    Throttled,
    /// A new call was dispatched for this request
    Dispatched,
}

impl Resolution {
    /// Whether this caller caused a producer invocation
    pub fn dispatched(&self) -> bool {
        matches!(self, Resolution::Dispatched)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::CacheHit => "cache-hit",
            Resolution::Joined => "joined",
            Resolution::Throttled => "throttled",
            Resolution::Dispatched => "dispatched",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A value together with the path that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<V> {
    pub value: V,
    pub resolution: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        let options = ExecuteOptions::default();
        assert!(!options.force);
        assert_eq!(options.ttl, Duration::from_secs(30));
        assert_eq!(options.throttle, Duration::from_millis(1500));
    }

    #[test]
    fn test_builder() {
        let options = ExecuteOptions::default().ttl_ms(1000).throttle_ms(0).force();
        assert!(options.force);
        assert_eq!(options.ttl, Duration::from_secs(1));
        assert_eq!(options.throttle, Duration::ZERO);
    }

    #[test]
    fn test_from_custom_config() {
        let config = CoordinatorConfig {
            ttl_ms: 250,
            throttle_ms: 100,
        };
        let options = ExecuteOptions::from(&config);
        assert_eq!(
            options,
            ExecuteOptions::new(Duration::from_millis(250), Duration::from_millis(100))
        );
    }
}
