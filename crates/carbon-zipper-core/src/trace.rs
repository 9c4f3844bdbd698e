//! Per-request phase timing (§4.A).

use std::time::{Duration, Instant};

/// Accumulates monotonic durations for labelled phases of a single request:
/// limiter wait, marshal, HTTP round-trip, body read, unmarshal, merge.
///
/// One `Trace` belongs to exactly one request and is not meant to be shared
/// across tasks; clone the handful of fields you need into a spawned task
/// instead of sharing the accumulator itself.
#[derive(Debug, Default)]
pub struct Trace {
    phases: Vec<(&'static str, Duration)>,
}

impl Trace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self { phases: Vec::new() }
    }

    /// Records `now - start` under `label`.
    pub fn add_phase(&mut self, label: &'static str, start: Instant) {
        self.phases.push((label, start.elapsed()));
    }

    /// Returns the recorded phases in the order they were added.
    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    /// Sum of all recorded phase durations.
    pub fn total(&self) -> Duration {
        self.phases.iter().map(|(_, d)| *d).sum()
    }
}
