//! keystone-cluster — high-availability coordination for Keystone.
//!
//! Tracks the liveness of every process instance ("node") in the
//! deployment, detects failures via heartbeat timeout, and runs a
//! lease-based leader election so exactly one node is primary at a
//! time. All authoritative state lives in the shared coordination
//! store; the coordinator holds only a local cache of the primary.
//!
//! # Architecture
//!
//! ```text
//! Coordinator (one per node)
//!   ├── register_node()  → Standby record in ha:nodes
//!   ├── Health loop (every health_check_interval)
//!   │   ├── Probe relational DB + coordination store
//!   │   ├── Refresh own heartbeat + metrics
//!   │   └── Sweep ha:nodes for expired heartbeats
//!   ├── elect_leader()   → NX claim on ha:leader_lock (TTL = 2×interval)
//!   ├── Event subscriber → ha:events (nodeJoined / nodeLeft / leaderChanged)
//!   └── Local observer channel (NodeFailure, LeaderChanged, ...)
//! ```
//!
//! # Failure semantics
//!
//! A node whose heartbeat is older than `interval × failover_threshold`
//! is marked `Failed` by whichever node notices first. If the failed
//! node held leadership, the detecting node immediately stands for
//! election. `Failed` is terminal — a node that comes back must
//! re-register to rejoin.
//!
//! `is_primary()` reads the local cache and can be stale for up to one
//! health-check interval after a failover elsewhere; callers needing a
//! strict answer must consult the lease record directly.

pub mod config;
pub mod coordinator;
pub mod events;
pub mod node;
pub mod probe;

pub use config::{HaConfig, HaMode};
pub use coordinator::Coordinator;
pub use events::{ClusterEvent, LocalEvent};
pub use node::{NodeMetrics, NodeRecord, NodeState};
pub use probe::{DbProbe, MetricsSource, NullMetrics, NullProbe};

use thiserror::Error;

/// Result type alias for coordinator operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors surfaced by the cluster coordinator.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{operation} requires active-passive mode (configured mode: {mode})")]
    InvalidMode {
        operation: &'static str,
        mode: HaMode,
    },

    #[error(transparent)]
    Store(#[from] keystone_store::StoreError),

    #[error("node record codec error: {0}")]
    Codec(String),
}
