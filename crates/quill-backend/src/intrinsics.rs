//! Intrinsic name tables
//!
//! Process-wide, read-only maps of scripting-level constants. Loaded once;
//! shared freely between independent module compilations.

use crate::ir::Constant;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Constants resolvable by name without touching the global object.
static INTRINSIC_CONSTANTS: Lazy<FxHashMap<&'static str, Constant>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("undefined", Constant::Undefined);
    map.insert("NaN", Constant::Number(f64::NAN));
    map.insert("Infinity", Constant::Number(f64::INFINITY));
    map
});

/// Look up an intrinsic constant by source-level name.
pub fn intrinsic_constant(name: &str) -> Option<Constant> {
    INTRINSIC_CONSTANTS.get(name).copied()
}

/// Names served by the intrinsic table, for lazy registration at function
/// open.
pub fn intrinsic_names() -> impl Iterator<Item = &'static str> {
    INTRINSIC_CONSTANTS.keys().copied()
}
