//! Property-based tests for the zipper's core invariants (§8).
//!
//! Run with: cargo test --test property_tests
//!
//! Deterministic edge cases already live alongside each pattern crate as
//! `#[cfg(test)]` unit tests; these use proptest to generate random inputs
//! and check the same invariants hold across the wider input space.

pub mod limiter;
pub mod merge;
pub mod pathcache;
pub mod single_flight;
