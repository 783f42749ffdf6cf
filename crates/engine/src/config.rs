//! Tunable engine constants.
//!
//! The teacher has no runtime config file to borrow the idiom from
//! directly; this mirrors the plain struct-of-constants shape its
//! `compiler/src/config.rs` used, sized down to the three knobs spec §3
//! actually names.

/// Radix, clash factor and tuple fanout. `radix` must be a power of two;
/// `radix.trailing_zeros()` is the per-level shift amount used by
/// [`crate::hash_trie`] routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Trie branching factor per level. Spec: "typically 16 or 32".
    pub radix: u32,
    /// Clash-factor multiplier in the expansion trigger `N > R^(H+1)*C`.
    pub clash_factor: u64,
    /// Tuple radix-trie fanout. Defaults to matching `radix`.
    pub tuple_fanout: u32,
}

impl EngineConfig {
    pub const fn new(radix: u32, clash_factor: u64, tuple_fanout: u32) -> Self {
        EngineConfig {
            radix,
            clash_factor,
            tuple_fanout,
        }
    }

    /// Per-level bit shift implied by `radix`. Panics (at const-eval time,
    /// via debug_assert in `new` callers) if `radix` is not a power of two.
    pub const fn shift(&self) -> u32 {
        self.radix.trailing_zeros()
    }

    pub const fn tuple_shift(&self) -> u32 {
        self.tuple_fanout.trailing_zeros()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::new(16, 4, 16)
    }
}
