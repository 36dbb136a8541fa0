//! Saga tuning knobs.

use std::time::Duration;

use tracing::warn;

/// Tunables for a saga run. Correctness does not depend on the values; they
/// trade latency against load on the remote service.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// Sleep between status polls.
    pub poll_interval: Duration,
    /// Overall polling budget.
    pub deadline: Duration,
    /// Largest artifact payload the applier will buffer, in bytes.
    pub payload_ceiling: u64,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            deadline: Duration::from_secs(300),
            payload_ceiling: 10 * 1024 * 1024,
        }
    }
}

impl SagaConfig {
    /// Defaults, overridden by `REGEN_POLL_INTERVAL_SECS`,
    /// `REGEN_DEADLINE_SECS` and `REGEN_PAYLOAD_CEILING_BYTES` when set.
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = read_env_u64("REGEN_POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env_u64("REGEN_DEADLINE_SECS") {
            config.deadline = Duration::from_secs(secs);
        }
        if let Some(bytes) = read_env_u64("REGEN_PAYLOAD_CEILING_BYTES") {
            config.payload_ceiling = bytes;
        }
        config
    }
}

fn read_env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SagaConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.deadline, Duration::from_secs(300));
        assert_eq!(config.payload_ceiling, 10 * 1024 * 1024);
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("REGEN_POLL_INTERVAL_SECS", "5");
        std::env::set_var("REGEN_DEADLINE_SECS", "not-a-number");
        std::env::set_var("REGEN_PAYLOAD_CEILING_BYTES", "1048576");

        let config = SagaConfig::from_env();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        // Unparsable override falls back to the default.
        assert_eq!(config.deadline, Duration::from_secs(300));
        assert_eq!(config.payload_ceiling, 1024 * 1024);

        std::env::remove_var("REGEN_POLL_INTERVAL_SECS");
        std::env::remove_var("REGEN_DEADLINE_SECS");
        std::env::remove_var("REGEN_PAYLOAD_CEILING_BYTES");
    }
}
