//! The unified error vocabulary used across every carbon-zipper crate (§7).
//!
//! Unlike a generic `ResilienceError<E>` that wraps an arbitrary
//! application error because it sits below a user's service,
//! `ZipperError` has no application layer above it to preserve: the zipper
//! itself is the top of this stack, so it is a plain, non-generic enum.

use std::fmt;

/// Coarse classification of a non-2xx HTTP response from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorClass {
    /// 4xx: the request itself was rejected.
    Client,
    /// 5xx: the backend failed to serve a well-formed request.
    Server,
    /// Any other non-2xx status.
    Unknown,
}

impl HttpErrorClass {
    /// Classifies a raw HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400..=499 => HttpErrorClass::Client,
            500..=599 => HttpErrorClass::Server,
            _ => HttpErrorClass::Unknown,
        }
    }
}

/// An error produced anywhere in the zipper's fan-out path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ZipperError {
    /// A backend returned an empty matching set.
    #[error("not found")]
    NotFound,

    /// A deadline expired before every chosen backend answered.
    #[error("timeout waiting on {unanswered:?}")]
    Timeout {
        /// Backends that had not answered when the deadline fired.
        unanswered: Vec<String>,
    },

    /// A backend returned a non-2xx status.
    #[error("backend returned HTTP {status} ({class:?})")]
    Http { status: u16, class: HttpErrorClass },

    /// Content-type negotiation or protobuf parsing failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// An internal invariant was violated; the request cannot proceed at all.
    #[error("fatal: {0}")]
    Fatal(String),

    /// A per-backend failure that still permits a partial result.
    #[error("{0}")]
    NonFatal(String),
}

impl ZipperError {
    /// `true` for [`ZipperError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, ZipperError::Timeout { .. })
    }

    /// `true` for [`ZipperError::Fatal`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, ZipperError::Fatal(_))
    }

    /// Builds an [`HttpErrorClass`]-carrying error from a raw status code.
    pub fn from_status(status: u16) -> Self {
        ZipperError::Http {
            status,
            class: HttpErrorClass::from_status(status),
        }
    }
}

/// A collection of per-backend errors gathered during one fan-out (§7).
///
/// The aggregate request succeeds if any backend contributed data to the
/// merged result; it fails iff the merged result stays empty, in which case
/// the bag is surfaced in full. A single [`ZipperError::Fatal`] anywhere in
/// the bag marks the whole bag fatal regardless of what else merged.
#[derive(Debug, Clone, Default)]
pub struct ErrorBag {
    errors: Vec<(String, ZipperError)>,
    fatal: bool,
}

impl ErrorBag {
    /// An empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error attributed to `backend`.
    pub fn push(&mut self, backend: impl Into<String>, err: ZipperError) {
        if err.is_fatal() {
            self.fatal = true;
        }
        self.errors.push((backend.into(), err));
    }

    /// Merges another bag's errors into this one (associative, order-independent).
    pub fn merge(&mut self, other: ErrorBag) {
        self.fatal |= other.fatal;
        self.errors.extend(other.errors);
    }

    /// `true` if no backend reported an error.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `true` if any recorded error was [`ZipperError::Fatal`].
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// The recorded `(backend, error)` pairs.
    pub fn errors(&self) -> &[(String, ZipperError)] {
        &self.errors
    }

    /// Names of backends whose error was a timeout, for the diagnostic header/log (§7).
    pub fn timed_out_servers(&self) -> Vec<String> {
        self.errors
            .iter()
            .filter(|(_, e)| e.is_timeout())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl fmt::Display for ErrorBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(backend, err)| format!("{backend}: {err}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        assert_eq!(HttpErrorClass::from_status(404), HttpErrorClass::Client);
        assert_eq!(HttpErrorClass::from_status(503), HttpErrorClass::Server);
        assert_eq!(HttpErrorClass::from_status(101), HttpErrorClass::Unknown);
    }

    #[test]
    fn bag_becomes_fatal_from_any_member() {
        let mut bag = ErrorBag::new();
        bag.push("b1", ZipperError::Timeout { unanswered: vec!["b1".into()] });
        assert!(!bag.is_fatal());
        bag.push("b2", ZipperError::Fatal("backend list empty".into()));
        assert!(bag.is_fatal());
    }

    #[test]
    fn merge_is_associative_over_contents() {
        let mut a = ErrorBag::new();
        a.push("b1", ZipperError::NotFound);
        let mut b = ErrorBag::new();
        b.push("b2", ZipperError::from_status(500));

        let mut merged_ab = a.clone();
        merged_ab.merge(b.clone());
        let mut merged_ba = b;
        merged_ba.merge(a);

        assert_eq!(merged_ab.errors().len(), merged_ba.errors().len());
    }

    #[test]
    fn timed_out_servers_lists_only_timeouts() {
        let mut bag = ErrorBag::new();
        bag.push("slow", ZipperError::Timeout { unanswered: vec!["slow".into()] });
        bag.push("broken", ZipperError::from_status(500));
        assert_eq!(bag.timed_out_servers(), vec!["slow".to_string()]);
    }
}
