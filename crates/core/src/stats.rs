//! Allocation and collection counters for diagnostics builds.
//!
//! Adapted from the teacher's `runtime::diagnostics` dump, which snapshots
//! counters on SIGQUIT. There is no signal handling here — the engine is
//! single-threaded and embedded, so a collaborator simply calls
//! [`Stats::snapshot`] whenever it wants a report (e.g. in response to its
//! own debugger command).

use std::cell::Cell;
use std::fmt;

/// Process-wide (thread-local, since the engine never spans threads)
/// counters for hash trie and value churn.
#[derive(Default)]
pub struct Stats {
    values_live: Cell<u64>,
    tries_live: Cell<u64>,
    expansions: Cell<u64>,
    contractions: Cell<u64>,
    clashes_chained: Cell<u64>,
}

impl Stats {
    pub const fn new() -> Self {
        Stats {
            values_live: Cell::new(0),
            tries_live: Cell::new(0),
            expansions: Cell::new(0),
            contractions: Cell::new(0),
            clashes_chained: Cell::new(0),
        }
    }

    pub fn value_created(&self) {
        self.values_live.set(self.values_live.get() + 1);
    }

    pub fn value_dropped(&self) {
        self.values_live.set(self.values_live.get().saturating_sub(1));
    }

    pub fn trie_created(&self) {
        self.tries_live.set(self.tries_live.get() + 1);
    }

    pub fn trie_dropped(&self) {
        self.tries_live.set(self.tries_live.get().saturating_sub(1));
    }

    pub fn trie_expanded(&self) {
        self.expansions.set(self.expansions.get() + 1);
        #[cfg(feature = "diagnostics")]
        tracing::trace!(target: "setl_core::stats", "trie expansion #{}", self.expansions.get());
    }

    pub fn trie_contracted(&self) {
        self.contractions.set(self.contractions.get() + 1);
        #[cfg(feature = "diagnostics")]
        tracing::trace!(target: "setl_core::stats", "trie contraction #{}", self.contractions.get());
    }

    pub fn clash_chained(&self) {
        self.clashes_chained.set(self.clashes_chained.get() + 1);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            values_live: self.values_live.get(),
            tries_live: self.tries_live.get(),
            expansions: self.expansions.get(),
            contractions: self.contractions.get(),
            clashes_chained: self.clashes_chained.get(),
        }
    }
}

/// An immutable point-in-time read of [`Stats`], safe to log or hand to a
/// collaborator's debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub values_live: u64,
    pub tries_live: u64,
    pub expansions: u64,
    pub contractions: u64,
    pub clashes_chained: u64,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "values_live={} tries_live={} expansions={} contractions={} clashes_chained={}",
            self.values_live, self.tries_live, self.expansions, self.contractions, self.clashes_chained
        )
    }
}

thread_local! {
    /// The engine is single-threaded per spec §5; a thread-local is just a
    /// process-wide global that survives without `unsafe static mut`.
    pub static STATS: Stats = const { Stats::new() };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_create_and_drop() {
        let stats = Stats::new();
        stats.value_created();
        stats.value_created();
        stats.value_dropped();
        assert_eq!(stats.snapshot().values_live, 1);
    }

    #[test]
    fn trie_counters_never_underflow() {
        let stats = Stats::new();
        stats.trie_dropped();
        assert_eq!(stats.snapshot().tries_live, 0);
    }
}
