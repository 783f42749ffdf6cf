//! Abend taxonomy and propagation.
//!
//! Every non-trivial engine operation either succeeds or *abends*: a coded,
//! user-visible diagnostic that unwinds back to the single outer
//! collaborator (the bytecode dispatcher) without any local recovery.
//! Internally, engine code returns `Result<T, Abend>` and propagates with
//! `?` like any other Rust crate. Only the `engine_api` facade at the very
//! edge of this crate degrades an `Err` into the thread-local slot below,
//! because that facade is the boundary a non-Rust dispatcher polls across
//! (the teacher's own `runtime::error` module exists for the identical
//! reason: `extern "C"` functions can't propagate a `Result`).
//!
//! `Fatal` is deliberately not a member of `Abend` — per spec it terminates
//! the process outright and is never caught by the dispatcher. Call
//! [`giveup`] for that case.

use std::cell::RefCell;
use std::fmt;

/// The error taxonomy from spec §7, minus `Fatal` (see module docs).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AbendKind {
    /// Operand tag does not satisfy an operator's precondition.
    TypeError,
    /// Operand value out of its admissible domain.
    DomainError,
    /// A user class lacks a required iterator method.
    MissingMethod,
    /// A user iterator method returned a value of the wrong shape.
    ContractViolation,
    /// An internal invariant was broken (cardinality/hash mismatch, …).
    Internal,
}

impl fmt::Display for AbendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbendKind::TypeError => "type error",
            AbendKind::DomainError => "domain error",
            AbendKind::MissingMethod => "missing method",
            AbendKind::ContractViolation => "contract violation",
            AbendKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// An abnormal termination of the current execution with a rendered,
/// user-visible diagnostic. Does not crash the process.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Abend {
    pub kind: AbendKind,
    pub message: String,
}

impl Abend {
    pub fn new(kind: AbendKind, message: impl Into<String>) -> Self {
        Abend {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Abend::new(AbendKind::TypeError, message)
    }

    pub fn domain_error(message: impl Into<String>) -> Self {
        Abend::new(AbendKind::DomainError, message)
    }

    pub fn missing_method(message: impl Into<String>) -> Self {
        Abend::new(AbendKind::MissingMethod, message)
    }

    pub fn contract_violation(message: impl Into<String>) -> Self {
        Abend::new(AbendKind::ContractViolation, message)
    }

    /// An `Internal` abend, additionally reported via [`trap`] so
    /// instrumented builds surface it even if the caller only logs the
    /// returned `Abend` at a much higher level.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        trap(&message);
        Abend::new(AbendKind::Internal, message)
    }
}

impl fmt::Display for Abend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Abend {}

pub type AbendResult<T> = Result<T, Abend>;

thread_local! {
    static LAST_ABEND: RefCell<Option<Abend>> = const { RefCell::new(None) };
}

/// Record `abend` in the thread-local slot consulted by `engine_api`'s
/// non-Rust-facing entry points.
pub fn set_last_abend(abend: Abend) {
    LAST_ABEND.with(|slot| *slot.borrow_mut() = Some(abend));
}

/// Take (and clear) the pending abend, if any.
pub fn take_last_abend() -> Option<Abend> {
    LAST_ABEND.with(|slot| slot.borrow_mut().take())
}

pub fn has_last_abend() -> bool {
    LAST_ABEND.with(|slot| slot.borrow().is_some())
}

pub fn clear_last_abend() {
    LAST_ABEND.with(|slot| *slot.borrow_mut() = None);
}

/// Report a broken internal invariant. In instrumented builds (the
/// `diagnostics` feature) this emits a `tracing::error!` event; otherwise
/// it is a no-op. Never panics or aborts — callers still return the
/// resulting `Abend` through the normal propagation path.
pub fn trap(message: &str) {
    #[cfg(feature = "diagnostics")]
    tracing::error!(target: "setl_core::trap", "{message}");
    #[cfg(not(feature = "diagnostics"))]
    let _ = message;
}

/// Unrecoverable allocation failure. Terminates the process; never
/// returns. There is no exception unwinding within the core for this
/// case, matching spec §7: "Fatal terminates the process."
pub fn giveup(message: &str) -> ! {
    #[cfg(feature = "diagnostics")]
    tracing::error!(target: "setl_core::giveup", "{message}");
    eprintln!("setl-rs: fatal: {message}");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abend_round_trips_through_thread_local_slot() {
        clear_last_abend();
        assert!(!has_last_abend());

        set_last_abend(Abend::type_error("expected Set, got Tuple"));
        assert!(has_last_abend());

        let abend = take_last_abend().unwrap();
        assert_eq!(abend.kind, AbendKind::TypeError);
        assert!(!has_last_abend());
    }

    #[test]
    fn internal_abend_carries_its_message() {
        let abend = Abend::internal("cardinality mismatch: N=3 but 4 cells reachable");
        assert_eq!(abend.kind, AbendKind::Internal);
        assert!(abend.message.contains("cardinality mismatch"));
    }

    #[test]
    fn display_includes_kind_and_message() {
        let abend = Abend::domain_error("index -1 out of range");
        assert_eq!(abend.to_string(), "domain error: index -1 out of range");
    }
}
