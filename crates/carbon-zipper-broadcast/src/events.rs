//! Observability events emitted by [`crate::BroadcastGroup`].

use carbon_zipper_core::ZipperEvent;
use std::time::Instant;

/// Lifecycle events for one fan-out.
#[derive(Debug, Clone)]
pub enum BroadcastEvent {
    /// Server selection resolved to fewer than all backends.
    ServersChosen { surface: &'static str, timestamp: Instant, chosen: usize, total: usize },
    /// A fan-out's child context deadline fired before every backend answered.
    TimedOut { surface: &'static str, timestamp: Instant, unanswered: Vec<String> },
    /// A fan-out completed with at least one backend contributing data.
    Completed { surface: &'static str, timestamp: Instant, answered: usize, failed: usize },
    /// A TLD probe discovered a prefix -> backend mapping.
    TldDiscovered { timestamp: Instant, tld: String, backend: String },
}

impl ZipperEvent for BroadcastEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BroadcastEvent::ServersChosen { .. } => "broadcast_servers_chosen",
            BroadcastEvent::TimedOut { .. } => "broadcast_timed_out",
            BroadcastEvent::Completed { .. } => "broadcast_completed",
            BroadcastEvent::TldDiscovered { .. } => "broadcast_tld_discovered",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BroadcastEvent::ServersChosen { timestamp, .. }
            | BroadcastEvent::TimedOut { timestamp, .. }
            | BroadcastEvent::Completed { timestamp, .. }
            | BroadcastEvent::TldDiscovered { timestamp, .. } => *timestamp,
        }
    }
}
