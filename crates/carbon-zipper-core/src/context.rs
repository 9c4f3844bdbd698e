//! Deadline- and cancellation-carrying request context.
//!
//! Every suspension point in the fan-out path (limiter acquire, HTTP
//! round-trip, channel recv, `QueryItem` wait) takes a `&Context` so it can
//! race against the caller's deadline instead of blocking forever (§5).

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::trace::Trace;

/// Carries a request's correlation id, deadline and cancellation signal
/// through the fan-out call tree.
///
/// Cloning a `Context` shares the same cancellation token and trace, but
/// [`Context::with_deadline`] produces a genuinely new child whose own
/// deadline can only be tighter than its parent's, never looser.
#[derive(Clone)]
pub struct Context {
    request_id: Uuid,
    deadline: Option<Instant>,
    cancel: CancellationToken,
    trace: Arc<Mutex<Trace>>,
}

impl Context {
    /// Creates a fresh top-level context with no deadline.
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            deadline: None,
            cancel: CancellationToken::new(),
            trace: Arc::new(Mutex::new(Trace::new())),
        }
    }

    /// Creates a top-level context for tests and standalone call sites where
    /// no caller-supplied correlation id exists yet.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }

    /// The correlation id propagated to backends via the request-id header.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Derives a child context whose deadline is `timeout` from now, clamped
    /// to never exceed the parent's own deadline.
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => Some(parent),
            _ => Some(candidate),
        };
        Self {
            request_id: self.request_id,
            deadline,
            cancel: self.cancel.child_token(),
            trace: Arc::clone(&self.trace),
        }
    }

    /// Whether the deadline has already passed or the token has fired.
    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || matches!(self.deadline, Some(d) if d <= Instant::now())
    }

    /// Time remaining before the deadline, or `None` if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancels this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once either the deadline elapses or the token is cancelled.
    pub async fn done(&self) {
        match self.remaining() {
            Some(remaining) => {
                tokio::select! {
                    _ = tokio::time::sleep(remaining) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }

    /// Records a phase duration against this request's shared trace.
    pub fn add_phase(&self, label: &'static str, start: Instant) {
        self.trace.lock().unwrap().add_phase(label, start);
    }

    /// Snapshots the trace recorded so far.
    pub fn trace_snapshot(&self) -> Vec<(&'static str, Duration)> {
        self.trace.lock().unwrap().phases().to_vec()
    }
}
