//! Value representation and collection engine for a SETL2-like language:
//! `Set`, `Map`, `Tuple`, `String`, arbitrary-precision `Integer`, their
//! shared extendible hash trie, and the suspendable iterators over all of
//! them.
//!
//! # Modules
//!
//! - `config`: tunable trie constants (radix, clash factor, tuple fanout).
//! - `bigint`: arbitrary-precision integers backing `Value::Long`.
//! - `string`: chunked mutable strings backing `Value::String`.
//! - `hash_trie`: the generic extendible hash trie `Set`/`Map` build on.
//! - `set`, `map`, `tuple`: the three collection types and their ops.
//! - `object`: user-defined classes, procedures, and the one callback the
//!   engine invokes back into the dispatcher.
//! - `iterator`: the fourteen suspendable cursor kinds.
//! - `value`: the tagged `Value` union, ref-counting contract, and
//!   `spec_equal`.
//! - `engine_api`: the external facade a bytecode dispatcher drives the
//!   engine through.

pub mod bigint;
pub mod config;
pub mod engine_api;
pub mod hash_trie;
pub mod iterator;
pub mod map;
pub mod object;
pub mod set;
pub mod string;
pub mod tuple;
pub mod value;

pub use bigint::IntegerBig;
pub use config::EngineConfig;
pub use engine_api::EngineApi;
pub use object::{ClassTable, DispatchSlot, Object, Procedure};
pub use string::SetlString;
pub use value::{mark, spec_equal, unmark, Value};
