//! Event system for observability, shared by every pattern crate.
//!
//! Mirrors `tower_resilience_core::events`: a trait-object listener
//! collection that each pattern crate's config builder exposes as `on_*`
//! callbacks.

#[cfg(feature = "tracing")]
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by zipper components (limiter, path cache,
/// query cache, backend).
pub trait ZipperEvent: Send + Sync + fmt::Debug {
    /// The event kind, e.g. `"limiter_rejected"`, `"cache_hit"`.
    fn event_type(&self) -> &'static str;

    /// When this event occurred.
    fn timestamp(&self) -> Instant;
}

/// Trait for listening to zipper events.
pub trait EventListener<E: ZipperEvent>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// Type alias for boxed event listeners.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners for one component instance.
#[derive(Clone)]
pub struct EventListeners<E: ZipperEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ZipperEvent> EventListeners<E> {
    /// An empty collection.
    pub fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    /// Adds a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Emits an event to every registered listener.
    ///
    /// A panicking listener is caught so it cannot take down the component
    /// that is reporting the event; with the `tracing` feature enabled the
    /// panic is logged.
    pub fn emit(&self, event: &E) {
        for (index, listener) in self.listeners.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));

            if let Err(_panic_payload) = result {
                #[cfg(feature = "tracing")]
                log_listener_panic(index, event, _panic_payload.as_ref());

                #[cfg(not(feature = "tracing"))]
                let _ = index;
            }
        }
    }

    /// `true` if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E: ZipperEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "tracing")]
fn log_listener_panic<E: ZipperEvent>(index: usize, event: &E, _payload: &dyn Any) {
    tracing::warn!(
        listener_index = index,
        event_type = event.event_type(),
        "event listener panicked"
    );
}

/// A function-based event listener.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<E>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps a plain closure as a listener.
    pub fn new(f: F) -> Self {
        Self { f, _phantom: std::marker::PhantomData }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ZipperEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event);
    }
}
