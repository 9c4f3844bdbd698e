//! Data model, associative merge helpers, and the protobuf wire codec
//! shared by every `carbon-zipper` crate (§3, §4.G).
//!
//! The wire types (generated from `proto/zipper.proto` via `prost-build`,
//! grounded on the optional `prost` dependency already present in the
//! reference `tako-core` crate) live in [`wire`]; the domain types used by
//! [`crate::merge`] and the cache-key derivation in [`key`] are plain Rust
//! structs independent of their wire representation, converted at the
//! edges via `From`/`TryFrom`.

pub mod error;
pub mod fetch;
pub mod info;
pub mod key;
pub mod matches;
pub mod merge;

pub mod wire {
    //! Generated protobuf message types for `zipper.proto`.
    include!(concat!(env!("OUT_DIR"), "/zipper.rs"));
}

pub use error::WireError;
pub use fetch::{FetchRequest, FetchResponse, MultiFetchRequest, MultiFetchResponse};
pub use info::{InfoResponse, Retention, ZipperInfoResponse};
pub use matches::{GlobMatch, Match, MultiGlobRequest, MultiGlobResponse};
pub use merge::Merge;
