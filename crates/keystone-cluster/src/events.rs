//! Cluster and local event types.
//!
//! Cluster events travel over the shared `ha:events` broadcast channel
//! as JSON `{"type": .., "nodeId": ..}` and are best-effort: they may
//! be lost without correctness impact, since the node and lease records
//! are the source of truth. Local events are the in-process observer
//! channel the coordinator re-emits on.

use serde::{Deserialize, Serialize};

/// A membership or leadership change, as published cluster-wide.
///
/// Unknown `type` values fail to deserialize and are logged and dropped
/// by the subscriber, never treated as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClusterEvent {
    #[serde(rename_all = "camelCase")]
    NodeJoined { node_id: String },
    #[serde(rename_all = "camelCase")]
    NodeLeft { node_id: String },
    #[serde(rename_all = "camelCase")]
    LeaderChanged { node_id: String },
}

/// In-process notification delivered to local observers.
///
/// Delivery is at-least-once: a leadership change this node initiated
/// is emitted directly and again when its own published cluster event
/// comes back around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEvent {
    NodeJoined(String),
    NodeLeft(String),
    LeaderChanged(String),
    NodeFailure(String),
}
