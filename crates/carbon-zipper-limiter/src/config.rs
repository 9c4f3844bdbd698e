//! Configuration for the per-backend limiter.

use crate::events::LimiterEvent;
use carbon_zipper_core::events::{EventListeners, FnListener};
use std::collections::HashMap;

/// Configuration for a [`crate::Limiter`].
///
/// Backends with no entry in `capacities` are unbounded: `enter`/`leave`
/// succeed immediately for them (§4.B).
#[derive(Clone)]
pub struct LimiterConfig {
    pub(crate) capacities: HashMap<String, usize>,
    pub(crate) event_listeners: EventListeners<LimiterEvent>,
}

impl LimiterConfig {
    /// Creates a configuration builder.
    pub fn builder() -> LimiterConfigBuilder {
        LimiterConfigBuilder::new()
    }
}

/// Builder for [`LimiterConfig`].
pub struct LimiterConfigBuilder {
    capacities: HashMap<String, usize>,
    event_listeners: EventListeners<LimiterEvent>,
}

impl LimiterConfigBuilder {
    /// An empty builder: every backend starts out unbounded.
    pub fn new() -> Self {
        Self {
            capacities: HashMap::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the concurrency ceiling for a single backend.
    ///
    /// A capacity of `0` is treated the same as never calling this method:
    /// the backend remains unbounded.
    pub fn capacity(mut self, backend: impl Into<String>, max_concurrent: usize) -> Self {
        if max_concurrent > 0 {
            self.capacities.insert(backend.into(), max_concurrent);
        }
        self
    }

    /// Sets capacities for every backend named in `capacities` at once.
    pub fn capacities(mut self, capacities: impl IntoIterator<Item = (String, usize)>) -> Self {
        for (backend, cap) in capacities {
            self = self.capacity(backend, cap);
        }
        self
    }

    /// Registers a callback invoked whenever a backend rejects a caller
    /// because its context finished before a slot freed up.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let LimiterEvent::Rejected { backend, .. } = event {
                f(backend);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> LimiterConfig {
        LimiterConfig {
            capacities: self.capacities,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for LimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
