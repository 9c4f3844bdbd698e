//! Configuration for a [`crate::BroadcastGroup`].

use crate::events::BroadcastEvent;
use carbon_zipper_core::events::{EventListener, EventListeners};
use carbon_zipper_querycache::QueryCacheConfig;
use std::time::Duration;

/// Per-surface deadlines applied to a fan-out's child [`carbon_zipper_core::Context`]
/// (§4.F step 3: "Render for Fetch, Find for Find/Info/Probe").
#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    pub(crate) find: Duration,
    pub(crate) render: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { find: Duration::from_secs(1), render: Duration::from_secs(10) }
    }
}

/// Configuration for a [`crate::BroadcastGroup`].
#[derive(Clone)]
pub struct BroadcastGroupConfig {
    pub(crate) name: String,
    pub(crate) timeouts: Timeouts,
    pub(crate) query_cache: QueryCacheConfig,
    pub(crate) event_listeners: EventListeners<BroadcastEvent>,
}

impl BroadcastGroupConfig {
    /// Creates a builder for a group named `name` (the prefix used in
    /// single-flight cache keys, §4.F step 1).
    pub fn builder(name: impl Into<String>) -> BroadcastGroupConfigBuilder {
        BroadcastGroupConfigBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`BroadcastGroupConfig`].
pub struct BroadcastGroupConfigBuilder {
    name: String,
    timeouts: Timeouts,
    query_cache: QueryCacheConfig,
    event_listeners: EventListeners<BroadcastEvent>,
}

impl BroadcastGroupConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeouts: Timeouts::default(),
            query_cache: QueryCacheConfig::builder().build(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Deadline applied to Find/Info/Probe fan-outs.
    pub fn find_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.find = timeout;
        self
    }

    /// Deadline applied to Fetch fan-outs.
    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.render = timeout;
        self
    }

    /// Configuration shared by the group's four internal single-flight
    /// caches (find, fetch, info, probe).
    pub fn query_cache(mut self, config: QueryCacheConfig) -> Self {
        self.query_cache = config;
        self
    }

    /// Registers a listener for broadcast lifecycle events.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<BroadcastEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    pub fn build(self) -> BroadcastGroupConfig {
        BroadcastGroupConfig {
            name: self.name,
            timeouts: self.timeouts,
            query_cache: self.query_cache,
            event_listeners: self.event_listeners,
        }
    }
}
