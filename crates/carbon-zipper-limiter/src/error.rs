//! Error type for the limiter.

use std::fmt;

/// Error returned by [`crate::Limiter::enter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterError {
    /// The caller's context finished before a slot became available.
    Deadline,
}

impl fmt::Display for LimiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimiterError::Deadline => write!(f, "deadline exceeded waiting for a limiter slot"),
        }
    }
}

impl std::error::Error for LimiterError {}

impl From<LimiterError> for carbon_zipper_core::ZipperError {
    fn from(_: LimiterError) -> Self {
        carbon_zipper_core::ZipperError::Timeout { unanswered: Vec::new() }
    }
}
