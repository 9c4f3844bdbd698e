//! Observability events emitted by [`crate::QueryCache`].

use carbon_zipper_core::events::ZipperEvent;
use std::time::Instant;

/// Lifecycle events for a single cache key, mirroring the
/// `tower_resilience_coalesce` join/lead/abort events it is grounded on.
#[derive(Debug, Clone)]
pub enum QueryCacheEvent {
    /// A caller became the leader for a key (no value was cached).
    Led { key: String, timestamp: Instant },
    /// A caller found the value already cached.
    Hit { key: String, timestamp: Instant },
    /// A caller joined an in-flight fetch as a follower.
    Joined { key: String, timestamp: Instant },
    /// The leader stored a value, waking any followers.
    Stored { key: String, timestamp: Instant, size: usize },
    /// The leader aborted without storing a value.
    Aborted { key: String, timestamp: Instant },
    /// An entry was evicted to stay within the configured size bound.
    Evicted { key: String, timestamp: Instant },
}

impl ZipperEvent for QueryCacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QueryCacheEvent::Led { .. } => "led",
            QueryCacheEvent::Hit { .. } => "hit",
            QueryCacheEvent::Joined { .. } => "joined",
            QueryCacheEvent::Stored { .. } => "stored",
            QueryCacheEvent::Aborted { .. } => "aborted",
            QueryCacheEvent::Evicted { .. } => "evicted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            QueryCacheEvent::Led { timestamp, .. }
            | QueryCacheEvent::Hit { timestamp, .. }
            | QueryCacheEvent::Joined { timestamp, .. }
            | QueryCacheEvent::Stored { timestamp, .. }
            | QueryCacheEvent::Aborted { timestamp, .. }
            | QueryCacheEvent::Evicted { timestamp, .. } => *timestamp,
        }
    }
}
