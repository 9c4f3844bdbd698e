//! Core infrastructure shared by every carbon-zipper crate.
//!
//! This crate provides the pieces that have no natural home in any single
//! pattern crate:
//! - [`Context`], the deadline + cancellation + request-id carrier threaded
//!   through every fan-out call.
//! - [`Trace`], a per-request phase-duration accumulator.
//! - [`ZipperError`] and [`ErrorBag`], the unified error vocabulary.
//! - An event system for observability, in the same shape as
//!   `tower_resilience_core::events`.

pub mod context;
pub mod error;
pub mod events;
pub mod trace;

pub use context::Context;
pub use error::{ErrorBag, HttpErrorClass, ZipperError};
pub use events::{EventListener, EventListeners, FnListener, ZipperEvent};
pub use trace::Trace;
