//! Shared plumbing for the setl-rs engine: the abend taxonomy and
//! diagnostics counters used by `setl-engine`. Kept in its own crate so
//! both `setl-engine` and any future collaborator crate can depend on the
//! error types without pulling in the value representation itself.
//!
//! # Modules
//!
//! - `error`: the `Abend` taxonomy and the thread-local last-abend slot
//!   consulted across the `engine_api` facade.
//! - `stats`: trie/value churn counters for instrumented builds.

pub mod error;
pub mod stats;

pub use error::{Abend, AbendKind, AbendResult};
