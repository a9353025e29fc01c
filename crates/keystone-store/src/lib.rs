//! keystone-store — coordination store port for Keystone.
//!
//! Defines the `CoordStore` trait: the key-value and pub/sub surface the
//! cluster coordinator needs from a shared coordination service. The
//! contract is deliberately narrow — scalar get/set with conditional
//! (`IfAbsent`/`IfPresent`) and TTL semantics, hash operations for the
//! node registry, and best-effort broadcast channels.
//!
//! # Architecture
//!
//! ```text
//! CoordStore (port)
//!   ├── get / set(SetOptions)       — leadership lease (atomic claim)
//!   ├── hash_set / hash_get_all     — node registry
//!   └── publish / subscribe         — cluster event channel
//!
//! MemoryStore (in-process backend)
//!   ├── Arc<Mutex<..>> shared state, Clone across tasks
//!   ├── TTL via tokio::time::Instant (works under paused test time)
//!   └── tokio broadcast channels per topic
//! ```
//!
//! The conditional-set outcome is a `bool`, not an error: losing an
//! atomic claim is contention, and callers decide what to do about it.
//! Messages on a channel may be dropped (slow subscribers are skipped);
//! the authoritative records, not the event stream, are the source of
//! truth.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{CoordStore, SetMode, SetOptions, Subscription};
