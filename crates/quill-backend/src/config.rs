//! Backend configuration
//!
//! A flat set of toggles controlling which transform passes run and which
//! emission patterns are used. Every toggle elides or swaps an optimization;
//! none changes program-observable semantics.

use serde::Deserialize;

/// Pass and emission toggles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Fold constant expressions to a fixed point.
    pub fold_constants: bool,
    /// Replace uncaptured single-store variable references with direct values.
    pub optimize_var_refs: bool,
    /// Eliminate redundant reloads of resident reference values.
    pub optimize_loads: bool,
    /// Remove stores and copies made dead by earlier passes.
    pub optimize_assignments: bool,
    /// Partition locals into grouped slots (off: single flat group).
    pub resolve_slots: bool,
    /// Defer releases to batch-friendly points.
    pub auto_release: bool,
    /// Coalesce adjacent releases into one vectorized release.
    pub merge_releases: bool,
    /// Assign monomorphic inline-cache slots to property reads.
    pub inline_property_cache: bool,
    /// Use the fast property helpers when the object is provably neither
    /// undefined nor null.
    pub null_check_optimization: bool,
    /// Emit retain/release as out-of-line helper calls instead of macros.
    pub plain_ref_helpers: bool,
    /// Upper bound on constant-folding iterations per function.
    pub max_fold_iterations: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fold_constants: true,
            optimize_var_refs: true,
            optimize_loads: true,
            optimize_assignments: true,
            resolve_slots: true,
            auto_release: true,
            merge_releases: true,
            inline_property_cache: true,
            null_check_optimization: true,
            plain_ref_helpers: false,
            max_fold_iterations: 16,
        }
    }
}

impl Options {
    /// All optimizations off; the stream is lowered as authored.
    pub fn none() -> Self {
        Self {
            fold_constants: false,
            optimize_var_refs: false,
            optimize_loads: false,
            optimize_assignments: false,
            resolve_slots: false,
            auto_release: false,
            merge_releases: false,
            inline_property_cache: false,
            null_check_optimization: false,
            plain_ref_helpers: false,
            max_fold_iterations: 16,
        }
    }

    /// Parse options from a JSON document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
