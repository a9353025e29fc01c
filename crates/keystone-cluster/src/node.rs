//! Node records — the per-process entries in the cluster registry.
//!
//! One record per live process, JSON-serialized into the `ha:nodes`
//! hash. `last_heartbeat` is monotonically non-decreasing while the
//! owning process is alive; any node may flip another's state to
//! `Failed` once its heartbeat expires.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a node.
///
/// `Active` means "currently primary": the election winner moves itself
/// `Standby → Active`. `Failed` is terminal — a failed node that comes
/// back must re-register (which resets it to `Standby`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Standby,
    Active,
    Failed,
}

impl NodeState {
    /// The single transition function. Legal edges:
    /// `Standby → Active` (won election), `Standby → Failed`,
    /// `Active → Failed`, and self-loops (idempotent re-application).
    /// Everything else — notably anything out of `Failed` — is `None`.
    pub fn transition(self, to: NodeState) -> Option<NodeState> {
        use NodeState::*;
        match (self, to) {
            (from, to) if from == to => Some(to),
            (Standby, Active) | (Standby, Failed) | (Active, Failed) => Some(to),
            _ => None,
        }
    }
}

/// Resource gauges reported with each heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeMetrics {
    pub cpu: f64,
    pub memory: f64,
    pub connections: u64,
}

/// One running process instance, as stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "status")]
    pub state: NodeState,
    /// Unix timestamp in milliseconds of the last heartbeat.
    pub last_heartbeat: u64,
    pub metrics: NodeMetrics,
}

impl NodeRecord {
    /// A freshly registered node: standby, zeroed metrics, heartbeat now.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: NodeState::Standby,
            last_heartbeat: unix_millis(),
            metrics: NodeMetrics::default(),
        }
    }

    /// Whether this record's heartbeat is older than the given window.
    pub fn heartbeat_expired(&self, now_ms: u64, window_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat) > window_ms
    }
}

/// Current wall-clock time as unix milliseconds.
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_standby_with_zeroed_metrics() {
        let record = NodeRecord::new("n1");
        assert_eq!(record.state, NodeState::Standby);
        assert_eq!(record.metrics, NodeMetrics::default());
        assert!(record.last_heartbeat > 0);
    }

    #[test]
    fn legal_transitions() {
        assert_eq!(
            NodeState::Standby.transition(NodeState::Active),
            Some(NodeState::Active)
        );
        assert_eq!(
            NodeState::Standby.transition(NodeState::Failed),
            Some(NodeState::Failed)
        );
        assert_eq!(
            NodeState::Active.transition(NodeState::Failed),
            Some(NodeState::Failed)
        );
    }

    #[test]
    fn self_loops_are_idempotent() {
        assert_eq!(
            NodeState::Failed.transition(NodeState::Failed),
            Some(NodeState::Failed)
        );
        assert_eq!(
            NodeState::Standby.transition(NodeState::Standby),
            Some(NodeState::Standby)
        );
    }

    #[test]
    fn failed_is_terminal() {
        assert_eq!(NodeState::Failed.transition(NodeState::Standby), None);
        assert_eq!(NodeState::Failed.transition(NodeState::Active), None);
        assert_eq!(NodeState::Active.transition(NodeState::Standby), None);
    }

    #[test]
    fn heartbeat_expiry_window() {
        let mut record = NodeRecord::new("n1");
        record.last_heartbeat = 10_000;

        assert!(!record.heartbeat_expired(25_000, 15_000));
        assert!(record.heartbeat_expired(25_001, 15_000));
        // Clock skew: a heartbeat from the future never reads as expired.
        assert!(!record.heartbeat_expired(5_000, 15_000));
    }

    #[test]
    fn wire_format_matches_registry_layout() {
        let record = NodeRecord {
            id: "n1".to_string(),
            state: NodeState::Standby,
            last_heartbeat: 1234,
            metrics: NodeMetrics::default(),
        };
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["id"], "n1");
        assert_eq!(json["status"], "standby");
        assert_eq!(json["lastHeartbeat"], 1234);
        assert_eq!(json["metrics"]["connections"], 0);
    }
}
