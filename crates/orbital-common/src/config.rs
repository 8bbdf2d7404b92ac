use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable timing knobs for the reconciliation engine.
///
/// The defaults mirror a GUI-refresh cadence; none of the values is
/// semantically load-bearing, but the debounce window must stay well below
/// the container poll interval or event-triggered refreshes degrade into
/// plain polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub container_interval: Duration,
    pub image_interval: Duration,
    pub volume_interval: Duration,
    pub network_interval: Duration,
    /// Quiet window collapsing a burst of daemon events into one refresh.
    pub event_debounce: Duration,
    /// Delay before resubscribing after the event stream drops.
    pub event_retry_delay: Duration,
    pub stats_interval: Duration,
    pub stats_error_delay: Duration,
    /// Upper bound on any single provider call; elapse is a transient fault.
    pub provider_timeout: Duration,
    /// Grace period the daemon gets before killing on stop/restart.
    pub stop_timeout_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            container_interval: Duration::from_secs(30),
            image_interval: Duration::from_secs(60),
            volume_interval: Duration::from_secs(30),
            network_interval: Duration::from_secs(30),
            event_debounce: Duration::from_millis(200),
            event_retry_delay: Duration::from_secs(5),
            stats_interval: Duration::from_secs(3),
            stats_error_delay: Duration::from_secs(5),
            provider_timeout: Duration::from_secs(5),
            stop_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.container_interval, Duration::from_secs(30));
        assert_eq!(config.image_interval, Duration::from_secs(60));
        assert_eq!(config.event_debounce, Duration::from_millis(200));
        assert!(config.event_debounce < config.container_interval);
    }

    #[test]
    fn test_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stop_timeout_secs, config.stop_timeout_secs);
    }
}
