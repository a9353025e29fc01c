//! MemoryStore — in-process `CoordStore` backend.
//!
//! Backs tests and single-process deployments. Keys live in a shared
//! map behind a mutex; TTLs are checked lazily on read and on
//! conditional writes using `tokio::time::Instant`, so lease expiry is
//! exercisable under paused test time.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;

use crate::error::StoreResult;
use crate::store::{CoordStore, SetMode, SetOptions, Subscription};

/// Buffered messages per channel before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now < deadline,
            None => true,
        }
    }
}

#[derive(Default)]
struct Inner {
    scalars: HashMap<String, Entry>,
    hashes: HashMap<String, HashMap<String, String>>,
    channels: HashMap<String, broadcast::Sender<String>>,
}

/// Shared in-memory coordination store.
///
/// `Clone` hands out handles to the same underlying state, so a set of
/// simulated nodes in one process coordinate exactly the way they would
/// through an external store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        Ok(inner
            .scalars
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let live = inner
            .scalars
            .get(key)
            .map(|entry| entry.is_live(now))
            .unwrap_or(false);

        let apply = match options.mode {
            SetMode::Always => true,
            SetMode::IfAbsent => !live,
            SetMode::IfPresent => live,
        };

        if apply {
            inner.scalars.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: options.ttl.map(|ttl| now + ttl),
                },
            );
        }
        Ok(apply)
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned())
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .hashes
            .get(key)
            .map(|hash| {
                hash.iter()
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn publish(&self, channel: &str, message: &str) -> StoreResult<usize> {
        let inner = self.inner.lock().await;
        match inner.channels.get(channel) {
            // send() only errors when there are no receivers; a message
            // nobody hears is still a successful publish.
            Some(sender) => Ok(sender.send(message.to_string()).unwrap_or(0)),
            None => Ok(0),
        }
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<Subscription> {
        let mut inner = self.inner.lock().await;
        let sender = inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(Subscription::new(sender.subscribe()))
    }
}
