//! Events emitted by the [`crate::Limiter`].

use carbon_zipper_core::ZipperEvent;
use std::time::Instant;

/// Observability events for the per-backend limiter.
#[derive(Debug, Clone)]
pub enum LimiterEvent {
    /// A caller acquired a slot for `backend`.
    Acquired {
        backend: String,
        timestamp: Instant,
        in_use: usize,
    },
    /// A caller's context finished (deadline/cancellation) before a slot freed up.
    Rejected { backend: String, timestamp: Instant },
    /// A caller released its slot for `backend`.
    Released { backend: String, timestamp: Instant },
}

impl ZipperEvent for LimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LimiterEvent::Acquired { .. } => "limiter_acquired",
            LimiterEvent::Rejected { .. } => "limiter_rejected",
            LimiterEvent::Released { .. } => "limiter_released",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            LimiterEvent::Acquired { timestamp, .. }
            | LimiterEvent::Rejected { timestamp, .. }
            | LimiterEvent::Released { timestamp, .. } => *timestamp,
        }
    }
}
