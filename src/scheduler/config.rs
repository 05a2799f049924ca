use std::time::Duration;

use crate::config::{env_or, parse_positive_secs, require_positive, ConfigError};
use crate::probe::DEFAULT_PROBE_TIMEOUT;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 16;

/// Sweep scheduler configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Sleep between the end of one sweep and the start of the next
    pub poll_interval: Duration,
    /// Deadline for a single probe
    pub probe_timeout: Duration,
    /// Upper bound on probes in flight during a sweep
    pub max_concurrent_probes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
        }
    }
}

impl SchedulerConfig {
    /// Read scheduler settings from environment variables
    /// NETHEALTH_POLL_INTERVAL_SECONDS=60
    /// NETHEALTH_HTTP_TIMEOUT_SECONDS=5.0
    /// NETHEALTH_MAX_CONCURRENT_PROBES=16
    pub fn from_env() -> Result<Self, ConfigError> {
        let poll_secs: u64 = env_or(
            "NETHEALTH_POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL.as_secs(),
        )?;
        require_positive("NETHEALTH_POLL_INTERVAL_SECONDS", poll_secs)?;

        let probe_timeout = match std::env::var("NETHEALTH_HTTP_TIMEOUT_SECONDS") {
            Ok(raw) => parse_positive_secs("NETHEALTH_HTTP_TIMEOUT_SECONDS", &raw)?,
            Err(_) => DEFAULT_PROBE_TIMEOUT,
        };

        let max_concurrent_probes: usize =
            env_or("NETHEALTH_MAX_CONCURRENT_PROBES", DEFAULT_MAX_CONCURRENT_PROBES)?;

        let config = Self {
            poll_interval: Duration::from_secs(poll_secs),
            probe_timeout,
            max_concurrent_probes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_probes(mut self, max: usize) -> Self {
        self.max_concurrent_probes = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "poll_interval".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "probe_timeout".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        require_positive("max_concurrent_probes", self.max_concurrent_probes as u64)
    }
}
