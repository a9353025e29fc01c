//! Coordinator configuration, derived from the environment.

use std::fmt;
use std::time::Duration;

use crate::{ClusterError, ClusterResult};

const DEFAULT_NODE_COUNT: u32 = 2;
const DEFAULT_INTERVAL_MS: u64 = 5000;
const DEFAULT_FAILOVER_THRESHOLD: u32 = 3;

/// High-availability operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HaMode {
    /// All nodes are equally privileged; no leader election runs.
    ActiveActive,
    /// One node holds the leadership lease; the rest stand by.
    #[default]
    ActivePassive,
}

impl HaMode {
    fn parse(value: &str) -> ClusterResult<Self> {
        match value {
            "active-active" => Ok(Self::ActiveActive),
            "active-passive" => Ok(Self::ActivePassive),
            other => Err(ClusterError::Config(format!(
                "unrecognized HA mode {other:?} (expected active-active or active-passive)"
            ))),
        }
    }
}

impl fmt::Display for HaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveActive => f.write_str("active-active"),
            Self::ActivePassive => f.write_str("active-passive"),
        }
    }
}

/// Configuration for the cluster coordinator.
#[derive(Debug, Clone)]
pub struct HaConfig {
    /// Operating mode; only active-passive runs leader election.
    pub mode: HaMode,
    /// Expected cluster size. Informational only, never enforced.
    pub node_count: u32,
    /// Period of the health-check loop.
    pub health_check_interval: Duration,
    /// Missed intervals before a node is declared failed.
    pub failover_threshold: u32,
    /// This process's node identity. When absent, self-referential
    /// operations (health checks, standing for election) no-op.
    pub node_id: Option<String>,
}

impl Default for HaConfig {
    fn default() -> Self {
        Self {
            mode: HaMode::default(),
            node_count: DEFAULT_NODE_COUNT,
            health_check_interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            failover_threshold: DEFAULT_FAILOVER_THRESHOLD,
            node_id: None,
        }
    }
}

impl HaConfig {
    /// Read configuration from `HA_MODE`, `HA_NODES`,
    /// `HA_HEALTH_CHECK_INTERVAL` (ms), `HA_FAILOVER_THRESHOLD`, and
    /// `NODE_ID`. Unset variables fall back to defaults; values that
    /// are set but unparseable are an error rather than silently
    /// defaulted.
    pub fn from_env() -> ClusterResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> ClusterResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(mode) = lookup("HA_MODE") {
            config.mode = HaMode::parse(&mode)?;
        }
        if let Some(nodes) = lookup("HA_NODES") {
            config.node_count = parse_number("HA_NODES", &nodes)?;
        }
        if let Some(interval) = lookup("HA_HEALTH_CHECK_INTERVAL") {
            let millis: u64 = parse_number("HA_HEALTH_CHECK_INTERVAL", &interval)?;
            config.health_check_interval = Duration::from_millis(millis);
        }
        if let Some(threshold) = lookup("HA_FAILOVER_THRESHOLD") {
            config.failover_threshold = parse_number("HA_FAILOVER_THRESHOLD", &threshold)?;
        }
        config.node_id = lookup("NODE_ID").filter(|id| !id.is_empty());

        Ok(config)
    }

    /// Heartbeat age beyond which a node is declared failed.
    pub fn failure_window(&self) -> Duration {
        self.health_check_interval * self.failover_threshold
    }

    /// Leadership lease TTL: two health-check intervals.
    pub fn lease_ttl(&self) -> Duration {
        self.health_check_interval * 2
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ClusterResult<T> {
    value
        .parse()
        .map_err(|_| ClusterError::Config(format!("{key} is not a valid number: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = HaConfig::from_vars(|_| None).unwrap();
        assert_eq!(config.mode, HaMode::ActivePassive);
        assert_eq!(config.node_count, 2);
        assert_eq!(config.health_check_interval, Duration::from_millis(5000));
        assert_eq!(config.failover_threshold, 3);
        assert!(config.node_id.is_none());
    }

    #[test]
    fn reads_all_variables() {
        let env = vars(&[
            ("HA_MODE", "active-active"),
            ("HA_NODES", "5"),
            ("HA_HEALTH_CHECK_INTERVAL", "1000"),
            ("HA_FAILOVER_THRESHOLD", "4"),
            ("NODE_ID", "n1"),
        ]);
        let config = HaConfig::from_vars(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.mode, HaMode::ActiveActive);
        assert_eq!(config.node_count, 5);
        assert_eq!(config.health_check_interval, Duration::from_millis(1000));
        assert_eq!(config.failover_threshold, 4);
        assert_eq!(config.node_id.as_deref(), Some("n1"));
    }

    #[test]
    fn invalid_mode_is_an_error() {
        let env = vars(&[("HA_MODE", "tri-active")]);
        let err = HaConfig::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ClusterError::Config(_)));
    }

    #[test]
    fn invalid_interval_is_an_error() {
        let env = vars(&[("HA_HEALTH_CHECK_INTERVAL", "soon")]);
        assert!(HaConfig::from_vars(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn empty_node_id_counts_as_unset() {
        let env = vars(&[("NODE_ID", "")]);
        let config = HaConfig::from_vars(|k| env.get(k).cloned()).unwrap();
        assert!(config.node_id.is_none());
    }

    #[test]
    fn derived_windows() {
        let config = HaConfig {
            health_check_interval: Duration::from_millis(5000),
            failover_threshold: 3,
            ..Default::default()
        };
        assert_eq!(config.failure_window(), Duration::from_millis(15000));
        assert_eq!(config.lease_ttl(), Duration::from_millis(10000));
    }
}
