//! Property-cache allocation
//!
//! One walk over the fully transformed module assigns an increasing slot
//! index to every property-read site. The resulting count sizes the
//! module-wide cache table in the emitted boilerplate.

use crate::ir::{Instr, ModuleIr};
use tracing::debug;

pub fn assign_cache_slots(module: &mut ModuleIr) {
    let mut next = 0u32;
    for func in &mut module.functions {
        for instr in &mut func.instrs {
            if let Instr::GetProperty { cache, .. } = instr {
                *cache = Some(next);
                next += 1;
            }
        }
    }
    module.property_cache_size = next;
    debug!(module = %module.name, slots = next, "property cache sized");
}
