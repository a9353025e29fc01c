//! The cluster coordinator.
//!
//! One `Coordinator` runs per process. It registers the node, drives
//! the periodic health check, detects failed peers, and competes for
//! the leadership lease. The coordination store is the single source of
//! truth; the only state held here is the cached primary pointer and
//! the local observer channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};

use keystone_store::{CoordStore, SetOptions};

use crate::config::{HaConfig, HaMode};
use crate::events::{ClusterEvent, LocalEvent};
use crate::node::{unix_millis, NodeMetrics, NodeRecord, NodeState};
use crate::probe::{DbProbe, MetricsSource, NullMetrics, NullProbe};
use crate::{ClusterError, ClusterResult};

/// Hash of node records, field = node id.
pub const NODES_KEY: &str = "ha:nodes";
/// Scalar key holding the current leader's node id, with TTL.
pub const LEADER_LOCK_KEY: &str = "ha:leader_lock";
/// Broadcast channel carrying cluster events.
pub const EVENTS_CHANNEL: &str = "ha:events";

/// Buffered local events before slow observers start lagging.
const LOCAL_EVENT_CAPACITY: usize = 32;

/// Per-node cluster coordinator.
pub struct Coordinator {
    config: HaConfig,
    store: Arc<dyn CoordStore>,
    db: Arc<dyn DbProbe>,
    metrics: Arc<dyn MetricsSource>,
    /// Cached primary pointer. Updated by elections, promotions, and
    /// received leaderChanged events; reads can be transiently stale.
    primary: RwLock<Option<String>>,
    local_events: broadcast::Sender<LocalEvent>,
    /// Skip-if-running guard for overlapping health checks.
    check_in_flight: AtomicBool,
}

impl Coordinator {
    /// Create a coordinator with no relational database and zeroed
    /// metrics. Use the `with_*` builders to wire in real probes.
    pub fn new(config: HaConfig, store: Arc<dyn CoordStore>) -> Self {
        let (local_events, _) = broadcast::channel(LOCAL_EVENT_CAPACITY);
        Self {
            config,
            store,
            db: Arc::new(NullProbe),
            metrics: Arc::new(NullMetrics),
            primary: RwLock::new(None),
            local_events,
            check_in_flight: AtomicBool::new(false),
        }
    }

    /// Set the relational-database connectivity probe.
    pub fn with_db_probe(mut self, db: Arc<dyn DbProbe>) -> Self {
        self.db = db;
        self
    }

    /// Set the resource metrics source.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSource>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &HaConfig {
        &self.config
    }

    /// Subscribe to local coordinator events.
    pub fn events(&self) -> broadcast::Receiver<LocalEvent> {
        self.local_events.subscribe()
    }

    // ── Node registry ──────────────────────────────────────────────

    /// Register a node: a Standby record with zeroed metrics and a
    /// fresh heartbeat. Re-registering an id overwrites prior state,
    /// which is how a failed node rejoins.
    pub async fn register_node(&self, node_id: &str) -> ClusterResult<()> {
        let record = NodeRecord::new(node_id);
        self.write_node(&record).await?;
        self.publish(&ClusterEvent::NodeJoined {
            node_id: node_id.to_string(),
        })
        .await;
        info!(%node_id, "node registered");
        Ok(())
    }

    /// Read-through query for a single node record.
    pub async fn node_status(&self, node_id: &str) -> ClusterResult<Option<NodeRecord>> {
        match self.store.hash_get(NODES_KEY, node_id).await? {
            Some(raw) => Ok(Some(decode_record(node_id, &raw)?)),
            None => Ok(None),
        }
    }

    /// Read-through query for every node record.
    pub async fn all_nodes(&self) -> ClusterResult<Vec<NodeRecord>> {
        let mut nodes = Vec::new();
        for (field, raw) in self.store.hash_get_all(NODES_KEY).await? {
            nodes.push(decode_record(&field, &raw)?);
        }
        Ok(nodes)
    }

    // ── Health checking ────────────────────────────────────────────

    /// Run one health check: probe the database and the store, refresh
    /// this node's heartbeat and metrics, then sweep the registry for
    /// peers whose heartbeats have expired.
    ///
    /// A failed probe is handled as a self-detected outage. Without a
    /// configured node id the check is a no-op. Overlapping runs are
    /// skipped rather than interleaved.
    pub async fn perform_health_check(&self) -> ClusterResult<()> {
        let Some(node_id) = self.config.node_id.clone() else {
            debug!("no node id configured; skipping health check");
            return Ok(());
        };

        if self.check_in_flight.swap(true, Ordering::SeqCst) {
            debug!(%node_id, "health check already running; skipping this round");
            return Ok(());
        }
        let result = self.health_check_inner(&node_id).await;
        self.check_in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Any error inside the check — probe failure, or the store going
    /// unreachable mid-check — is a liveness signal about this node,
    /// not a caller error.
    async fn health_check_inner(&self, node_id: &str) -> ClusterResult<()> {
        if let Err(error) = self.db.ping().await {
            warn!(%node_id, %error, "database probe failed; treating as local outage");
            return self.handle_node_failure(node_id).await;
        }
        if let Err(error) = self.store.ping().await {
            warn!(%node_id, %error, "coordination store probe failed; treating as local outage");
            return self.handle_node_failure(node_id).await;
        }

        let metrics = self.metrics.collect().await;
        if let Err(error) = self.refresh_heartbeat(node_id, metrics).await {
            warn!(%node_id, %error, "heartbeat refresh failed; treating as local outage");
            return self.handle_node_failure(node_id).await;
        }
        if let Err(error) = self.sweep_expired_heartbeats().await {
            warn!(%node_id, %error, "registry sweep failed; treating as local outage");
            return self.handle_node_failure(node_id).await;
        }
        Ok(())
    }

    async fn refresh_heartbeat(&self, node_id: &str, metrics: NodeMetrics) -> ClusterResult<()> {
        let mut record = match self.node_status(node_id).await? {
            Some(record) => record,
            // Registry entry lost (store flush, expiry): re-register.
            None => NodeRecord::new(node_id),
        };
        record.last_heartbeat = unix_millis();
        record.metrics = metrics;
        self.write_node(&record).await?;
        debug!(%node_id, "heartbeat refreshed");
        Ok(())
    }

    /// Scan the registry and fail every non-failed node whose heartbeat
    /// is older than `interval × failover_threshold` — including nodes
    /// other than self.
    async fn sweep_expired_heartbeats(&self) -> ClusterResult<()> {
        let window_ms = self.config.failure_window().as_millis() as u64;
        let now = unix_millis();

        for (field, raw) in self.store.hash_get_all(NODES_KEY).await? {
            let record = match decode_record(&field, &raw) {
                Ok(record) => record,
                Err(error) => {
                    warn!(node_id = %field, %error, "skipping malformed node record");
                    continue;
                }
            };
            if record.state == NodeState::Failed {
                continue;
            }
            if record.heartbeat_expired(now, window_ms) {
                warn!(
                    node_id = %record.id,
                    last_heartbeat = record.last_heartbeat,
                    "heartbeat expired"
                );
                self.handle_node_failure(&record.id).await?;
            }
        }
        Ok(())
    }

    /// Mark a node failed, re-elect if it held leadership, and notify
    /// local observers.
    ///
    /// Store errors while marking are logged, not propagated — this
    /// path must also work when the outage being reported is the store
    /// itself.
    pub async fn handle_node_failure(&self, node_id: &str) -> ClusterResult<()> {
        match self.node_status(node_id).await {
            Ok(Some(mut record)) => {
                if record.state == NodeState::Failed {
                    debug!(%node_id, "node already failed");
                    return Ok(());
                }
                if let Some(state) = record.state.transition(NodeState::Failed) {
                    record.state = state;
                    if let Err(error) = self.write_node(&record).await {
                        warn!(%node_id, %error, "could not persist failed state");
                    }
                }
            }
            Ok(None) => warn!(%node_id, "failure reported for unknown node"),
            Err(error) => warn!(%node_id, %error, "could not read node record during failure handling"),
        }
        info!(%node_id, "node marked failed");

        let was_primary = self.primary.read().await.as_deref() == Some(node_id);
        if was_primary {
            *self.primary.write().await = None;
            if let Err(error) = self.elect_leader().await {
                warn!(%error, "failover election failed");
            }
        }

        let _ = self.local_events.send(LocalEvent::NodeFailure(node_id.to_string()));
        Ok(())
    }

    // ── Leadership ─────────────────────────────────────────────────

    /// Stand for election: an atomic claim of the leadership lease with
    /// TTL `2 × health_check_interval`, succeeding only while no live
    /// lease exists. Returns whether this node won. Losing is not an
    /// error, and there is no retry timer — the next attempt happens
    /// when the current primary is detected failed.
    ///
    /// In active-active mode every node is equally privileged and this
    /// returns `false` without touching the store.
    pub async fn elect_leader(&self) -> ClusterResult<bool> {
        if self.config.mode != HaMode::ActivePassive {
            debug!("leader election skipped in active-active mode");
            return Ok(false);
        }
        let Some(node_id) = self.config.node_id.clone() else {
            debug!("no node id configured; cannot stand for election");
            return Ok(false);
        };

        let won = self
            .store
            .set(
                LEADER_LOCK_KEY,
                &node_id,
                SetOptions::if_absent(self.config.lease_ttl()),
            )
            .await?;

        if won {
            *self.primary.write().await = Some(node_id.clone());
            self.mark_active(&node_id).await;
            self.publish(&ClusterEvent::LeaderChanged {
                node_id: node_id.clone(),
            })
            .await;
            let _ = self
                .local_events
                .send(LocalEvent::LeaderChanged(node_id.clone()));
            info!(%node_id, "acquired leadership lease");
        } else {
            debug!(%node_id, "leadership lease already held");
        }
        Ok(won)
    }

    /// Administrative promotion: atomically hand the lease to `node_id`
    /// with a fresh TTL, succeeding only while *some* live lease exists
    /// (replace, not create). Returns `false` when the conditional set
    /// loses the race; errors only on configuration or store failure.
    pub async fn promote_to_leader(&self, node_id: &str) -> ClusterResult<bool> {
        if self.config.mode != HaMode::ActivePassive {
            return Err(ClusterError::InvalidMode {
                operation: "promote_to_leader",
                mode: self.config.mode,
            });
        }

        let promoted = self
            .store
            .set(
                LEADER_LOCK_KEY,
                node_id,
                SetOptions::if_present(self.config.lease_ttl()),
            )
            .await?;

        if promoted {
            *self.primary.write().await = Some(node_id.to_string());
            self.publish(&ClusterEvent::LeaderChanged {
                node_id: node_id.to_string(),
            })
            .await;
            let _ = self
                .local_events
                .send(LocalEvent::LeaderChanged(node_id.to_string()));
            info!(%node_id, "promoted to leader");
        }
        Ok(promoted)
    }

    /// Whether this node believes it is primary. A pure cache read: it
    /// can be stale for up to one interval after a failover elsewhere.
    pub async fn is_primary(&self) -> bool {
        match (&self.config.node_id, self.primary.read().await.as_deref()) {
            (Some(own), Some(primary)) => own == primary,
            _ => false,
        }
    }

    /// The cached primary pointer, if any.
    pub async fn primary_node(&self) -> Option<String> {
        self.primary.read().await.clone()
    }

    /// Move a node's record to Active after it won election.
    /// Best-effort: leadership is established by the lease, not this.
    async fn mark_active(&self, node_id: &str) {
        match self.node_status(node_id).await {
            Ok(Some(mut record)) => {
                if let Some(state) = record.state.transition(NodeState::Active) {
                    record.state = state;
                    if let Err(error) = self.write_node(&record).await {
                        warn!(%node_id, %error, "could not persist active state");
                    }
                }
            }
            Ok(None) => warn!(%node_id, "elected node has no registry entry"),
            Err(error) => warn!(%node_id, %error, "could not read elected node's record"),
        }
    }

    // ── Event loop ─────────────────────────────────────────────────

    /// Drive the coordinator until shutdown: register, seed the primary
    /// cache from the lease record, make an initial election attempt,
    /// then interleave the health-check timer with the cluster event
    /// subscription.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ClusterResult<()> {
        if let Some(node_id) = self.config.node_id.clone() {
            self.register_node(&node_id).await?;
        }

        // The lease record is authoritative; events published before we
        // subscribed are gone.
        if let Some(holder) = self.store.get(LEADER_LOCK_KEY).await? {
            *self.primary.write().await = Some(holder);
        }

        if self.config.mode == HaMode::ActivePassive {
            self.elect_leader().await?;
        }

        let mut events = self.store.subscribe(EVENTS_CHANNEL).await?;
        info!(
            mode = %self.config.mode,
            interval = ?self.config.health_check_interval,
            "coordinator running"
        );

        // A standing interval, not a per-iteration sleep: received
        // events must not push back the next health check.
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.health_check_interval,
            self.config.health_check_interval,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = self.perform_health_check().await {
                        warn!(%error, "health check failed");
                    }
                }
                message = events.recv() => {
                    match message {
                        Some(raw) => self.dispatch_cluster_event(&raw).await,
                        None => {
                            warn!("cluster event channel closed");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("coordinator shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Handle one raw message from the cluster event channel. Malformed
    /// or unknown payloads are logged and dropped.
    pub async fn dispatch_cluster_event(&self, raw: &str) {
        let event: ClusterEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(error) => {
                warn!(%error, "ignoring malformed or unknown cluster event");
                return;
            }
        };

        match event {
            ClusterEvent::NodeJoined { node_id } => {
                info!(%node_id, "node joined the cluster");
                let _ = self.local_events.send(LocalEvent::NodeJoined(node_id));
            }
            ClusterEvent::NodeLeft { node_id } => {
                info!(%node_id, "node left the cluster");
                let _ = self.local_events.send(LocalEvent::NodeLeft(node_id));
            }
            ClusterEvent::LeaderChanged { node_id } => {
                info!(%node_id, "leader changed");
                *self.primary.write().await = Some(node_id.clone());
                let _ = self.local_events.send(LocalEvent::LeaderChanged(node_id));
            }
        }
    }

    // ── Store plumbing ─────────────────────────────────────────────

    async fn write_node(&self, record: &NodeRecord) -> ClusterResult<()> {
        let raw = serde_json::to_string(record).map_err(|e| ClusterError::Codec(e.to_string()))?;
        self.store.hash_set(NODES_KEY, &record.id, &raw).await?;
        Ok(())
    }

    /// Publish a cluster event. Best-effort: losses are logged, never
    /// propagated, since records remain the source of truth.
    async fn publish(&self, event: &ClusterEvent) {
        let raw = match serde_json::to_string(event) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "could not encode cluster event");
                return;
            }
        };
        if let Err(error) = self.store.publish(EVENTS_CHANNEL, &raw).await {
            warn!(%error, "could not publish cluster event");
        }
    }
}

fn decode_record(node_id: &str, raw: &str) -> ClusterResult<NodeRecord> {
    serde_json::from_str(raw)
        .map_err(|e| ClusterError::Codec(format!("node {node_id}: {e}")))
}
