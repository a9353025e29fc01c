//! Pluggable probes — relational-database connectivity and local
//! resource metrics.
//!
//! The coordinator treats a failed probe as a liveness signal for this
//! node, not as a crash. Metric collection has no mandated algorithm;
//! deployments plug in whatever gauge source they have.

use async_trait::async_trait;

use crate::node::NodeMetrics;

/// Connectivity probe against the shared relational database.
#[async_trait]
pub trait DbProbe: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;
}

/// A probe that always succeeds, for deployments without a relational
/// database and for tests.
pub struct NullProbe;

#[async_trait]
impl DbProbe for NullProbe {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Source of the resource gauges reported with each heartbeat.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn collect(&self) -> NodeMetrics;
}

/// Zero-valued gauges, the default when no collector is wired in.
pub struct NullMetrics;

#[async_trait]
impl MetricsSource for NullMetrics {
    async fn collect(&self) -> NodeMetrics {
        NodeMetrics::default()
    }
}
