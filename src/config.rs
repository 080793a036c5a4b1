//! Runtime configuration.
//!
//! Mirrors the original's scattered defaults (monitor refresh rate, status
//! read retry budget, tmux session prefix) collected into one `Config`
//! struct with a `Default` impl, and an `env`-based loader in the spirit
//! of the teacher's `dotenv` dependency. There is no YAML loader; every
//! key is a plain `CMDQ_`-prefixed environment variable.

use std::time::Duration;

/// Baseline allow-list of `scontrol show job` keys whose values may contain
/// spaces and equals signs.
pub const DEFAULT_SCONTROL_POSITIONAL_KEYS: &[&str] = &[
    "JobName", "WorkDir", "StdErr", "StdIn", "StdOut", "Command", "NodeList", "BatchHost",
    "Partition",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Monitor poll interval.
    pub monitor_refresh_interval: Duration,
    /// Bounded retry budget for reading a status file.
    pub status_read_attempts: u32,
    pub status_read_interval: Duration,
    /// Fixed literal prefix for multi-session terminal sessions.
    pub session_prefix: String,
    /// Backend selected when the caller does not name one explicitly.
    pub default_backend: String,
    /// See [`DEFAULT_SCONTROL_POSITIONAL_KEYS`]; configurable.
    pub scontrol_positional_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor_refresh_interval: Duration::from_millis(400),
            status_read_attempts: 100,
            status_read_interval: Duration::from_millis(10),
            session_prefix: "cmdq_".to_string(),
            default_backend: "serial".to_string(),
            scontrol_positional_keys: DEFAULT_SCONTROL_POSITIONAL_KEYS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Loads overrides from `CMDQ_*` environment variables on top of
    /// [`Config::default`]. Call sites are expected to have already invoked
    /// `dotenv::dotenv().ok()` in `main` so a `.env` file is visible to
    /// `std::env::var`, matching the teacher's `dotenv` usage.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("CMDQ_MONITOR_REFRESH_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                config.monitor_refresh_interval = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("CMDQ_STATUS_READ_ATTEMPTS") {
            if let Ok(n) = v.parse::<u32>() {
                config.status_read_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("CMDQ_STATUS_READ_INTERVAL_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                config.status_read_interval = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("CMDQ_SESSION_PREFIX") {
            config.session_prefix = v;
        }
        if let Ok(v) = std::env::var("CMDQ_DEFAULT_BACKEND") {
            config.default_backend = v;
        }
        if let Ok(v) = std::env::var("CMDQ_SCONTROL_POSITIONAL_KEYS") {
            config.scontrol_positional_keys = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.monitor_refresh_interval, Duration::from_millis(400));
        assert_eq!(config.status_read_attempts, 100);
        assert_eq!(config.status_read_interval, Duration::from_millis(10));
        assert_eq!(config.session_prefix, "cmdq_");
    }

    #[test]
    fn scontrol_keys_default_to_baseline() {
        let config = Config::default();
        assert_eq!(config.scontrol_positional_keys.len(), DEFAULT_SCONTROL_POSITIONAL_KEYS.len());
        assert!(config.scontrol_positional_keys.contains(&"WorkDir".to_string()));
    }
}
