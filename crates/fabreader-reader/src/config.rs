//! Reader timing and endpoint configuration.
//!
//! Every knob defaults to the matching constant in
//! [`fabreader_core::constants`]. Durations are (de)serialized as
//! milliseconds so the binary's TOML file reads naturally:
//!
//! ```toml
//! removal_timeout = 1000
//! status_interval = 5000
//!
//! [target]
//! host = "fablab.local"
//! port = 3000
//! ```

use fabreader_core::constants::{
    AUTH_MAX_ATTEMPTS, AUTH_RETRY_DELAY_MS, CARD_REMOVAL_TIMEOUT_MS, DETECT_TIMEOUT_MS,
    LINK_HEALTH_POLL_MS, LINK_MAINTAIN_INTERVAL_MS, LOOP_TICK_MS, NETWORK_RETRY_DELAY_MS,
    RECOVERY_SETTLE_MS, REACHABILITY_PROBE_TIMEOUT_MS, SESSION_RECONNECT_INTERVAL_MS,
    STATUS_INTERVAL_MS,
};
use fabreader_core::{Error, Result};
use fabreader_network::SessionTarget;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the [`ReaderOrchestrator`](crate::ReaderOrchestrator).
///
/// # Example
///
/// ```
/// use fabreader_reader::ReaderConfig;
/// use std::time::Duration;
///
/// let config = ReaderConfig {
///     removal_timeout: Duration::from_millis(1500),
///     ..ReaderConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Server endpoint of the session.
    pub target: SessionTarget,

    /// Continuous absence after which a tracked card is dropped.
    #[serde(with = "fabreader_core::duration_ms")]
    pub removal_timeout: Duration,

    /// Hardware timeout of a single detection poll.
    #[serde(with = "fabreader_core::duration_ms")]
    pub detect_timeout: Duration,

    /// Periodic status cadence while the session is open.
    #[serde(with = "fabreader_core::duration_ms")]
    pub status_interval: Duration,

    /// Minimum spacing between session connect attempts.
    #[serde(with = "fabreader_core::duration_ms")]
    pub session_reconnect_interval: Duration,

    /// Cadence of the link supervisor.
    #[serde(with = "fabreader_core::duration_ms")]
    pub link_health_poll: Duration,

    /// Backoff after a failed link bring-up.
    #[serde(with = "fabreader_core::duration_ms")]
    pub network_retry_delay: Duration,

    /// Spacing between `NetworkLink::maintain` calls.
    #[serde(with = "fabreader_core::duration_ms")]
    pub link_maintain_interval: Duration,

    /// Settle delay before every recovery diagnosis.
    #[serde(with = "fabreader_core::duration_ms")]
    pub recovery_settle: Duration,

    /// Pause between main loop iterations.
    #[serde(with = "fabreader_core::duration_ms")]
    pub loop_tick: Duration,

    /// Run a TCP reachability probe after the link comes up.
    pub reachability_probe: bool,

    #[serde(with = "fabreader_core::duration_ms")]
    pub reachability_timeout: Duration,

    /// Authentication tries per `authenticate` command.
    pub auth_attempts: u32,

    #[serde(with = "fabreader_core::duration_ms")]
    pub auth_retry_delay: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            target: SessionTarget::default(),
            removal_timeout: Duration::from_millis(CARD_REMOVAL_TIMEOUT_MS),
            detect_timeout: Duration::from_millis(DETECT_TIMEOUT_MS),
            status_interval: Duration::from_millis(STATUS_INTERVAL_MS),
            session_reconnect_interval: Duration::from_millis(SESSION_RECONNECT_INTERVAL_MS),
            link_health_poll: Duration::from_millis(LINK_HEALTH_POLL_MS),
            network_retry_delay: Duration::from_millis(NETWORK_RETRY_DELAY_MS),
            link_maintain_interval: Duration::from_millis(LINK_MAINTAIN_INTERVAL_MS),
            recovery_settle: Duration::from_millis(RECOVERY_SETTLE_MS),
            loop_tick: Duration::from_millis(LOOP_TICK_MS),
            reachability_probe: true,
            reachability_timeout: Duration::from_millis(REACHABILITY_PROBE_TIMEOUT_MS),
            auth_attempts: AUTH_MAX_ATTEMPTS,
            auth_retry_delay: Duration::from_millis(AUTH_RETRY_DELAY_MS),
        }
    }
}

impl ReaderConfig {
    /// Reject settings the main loop cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an empty host, a zero port, a zero
    /// status or health interval, or zero authentication attempts.
    pub fn validate(&self) -> Result<()> {
        if self.target.host.trim().is_empty() {
            return Err(Error::Config("target.host must not be empty".to_string()));
        }
        if self.target.port == 0 {
            return Err(Error::Config("target.port must not be 0".to_string()));
        }
        if self.status_interval.is_zero() {
            return Err(Error::Config("status_interval must be positive".to_string()));
        }
        if self.link_health_poll.is_zero() {
            return Err(Error::Config("link_health_poll must be positive".to_string()));
        }
        if self.auth_attempts == 0 {
            return Err(Error::Config("auth_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = ReaderConfig::default();
        assert_eq!(config.removal_timeout, Duration::from_millis(1000));
        assert_eq!(config.status_interval, Duration::from_millis(5000));
        assert_eq!(config.session_reconnect_interval, Duration::from_millis(5000));
        assert_eq!(config.recovery_settle, Duration::from_secs(10));
        assert_eq!(config.auth_attempts, 3);
        assert_eq!(config.auth_retry_delay, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ReaderConfig = toml::from_str(
            r#"
            status_interval = 2000

            [target]
            host = "fablab.local"
            "#,
        )
        .unwrap();

        assert_eq!(config.status_interval, Duration::from_secs(2));
        assert_eq!(config.removal_timeout, Duration::from_millis(1000));
        assert_eq!(config.target.host, "fablab.local");
        assert_eq!(config.target.port, 3000);
        assert_eq!(config.target.path, "api/fab-reader/ws");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ReaderConfig::default();
        config.target.host = " ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = ReaderConfig {
            auth_attempts: 0,
            ..ReaderConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
