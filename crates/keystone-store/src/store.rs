//! The `CoordStore` trait — what Keystone requires from a coordination
//! service.
//!
//! Backends are expected to provide atomic conditional-set (the lease
//! claim primitive) and named broadcast channels. Everything else is
//! plain key-value plumbing.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::StoreResult;

/// Conditional mode for a scalar `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    /// Unconditional write.
    #[default]
    Always,
    /// Only write if the key is absent (or expired). The claim primitive.
    IfAbsent,
    /// Only write if the key currently holds a live value. The replace
    /// primitive.
    IfPresent,
}

/// Options for a scalar `set`: conditional mode plus optional TTL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub mode: SetMode,
    pub ttl: Option<Duration>,
}

impl SetOptions {
    /// Unconditional set with no expiry.
    pub fn always() -> Self {
        Self::default()
    }

    /// Set-if-absent with a TTL — acquire an exclusive lease.
    pub fn if_absent(ttl: Duration) -> Self {
        Self {
            mode: SetMode::IfAbsent,
            ttl: Some(ttl),
        }
    }

    /// Set-if-present with a TTL — replace an existing lease holder.
    pub fn if_present(ttl: Duration) -> Self {
        Self {
            mode: SetMode::IfPresent,
            ttl: Some(ttl),
        }
    }
}

/// Receiver half of a named broadcast channel.
///
/// Delivery is best-effort: a subscriber that falls behind has the
/// missed messages dropped, not buffered forever.
pub struct Subscription {
    rx: broadcast::Receiver<String>,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Receive the next message, or `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "subscription lagged; dropping missed messages");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Async port over a shared coordination service.
///
/// Implementations must be shareable across tasks; all operations
/// suspend until the backend I/O completes.
#[async_trait]
pub trait CoordStore: Send + Sync {
    /// Connectivity probe. An error here is treated by callers as a
    /// liveness signal, not a crash.
    async fn ping(&self) -> StoreResult<()>;

    /// Read a scalar key. Expired keys read as absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Conditionally write a scalar key. Returns whether the write was
    /// applied — a lost claim is `false`, never an error.
    async fn set(&self, key: &str, value: &str, options: SetOptions) -> StoreResult<bool>;

    /// Write one field of a hash.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Read one field of a hash.
    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Read every field of a hash.
    async fn hash_get_all(&self, key: &str) -> StoreResult<Vec<(String, String)>>;

    /// Publish a message to a named channel. Returns the number of
    /// subscribers the message reached.
    async fn publish(&self, channel: &str, message: &str) -> StoreResult<usize>;

    /// Open a persistent subscription to a named channel.
    async fn subscribe(&self, channel: &str) -> StoreResult<Subscription>;
}
