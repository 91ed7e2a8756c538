//! Assignment optimization
//!
//! Collapses copy chains left behind by the reference passes (reads of a
//! copy's destination become reads of its source) and sweeps pure
//! instructions whose result is never read.

use crate::ir::{FunctionIr, Instr, ValueId, ValueTable};
use rustc_hash::{FxHashMap, FxHashSet};

/// Returns the number of instructions removed.
pub(super) fn run(func: &mut FunctionIr, values: &ValueTable) -> usize {
    let mut removed = 0;

    // Copy forwarding. Chains resolve to their root source.
    let mut forward: FxHashMap<ValueId, ValueId> = FxHashMap::default();
    for instr in &func.instrs {
        if let Instr::Copy { dest, src } = instr {
            if !values.is_assignable(*dest) && !values.is_assignable(*src) {
                let root = *forward.get(src).unwrap_or(src);
                forward.insert(*dest, root);
            }
        }
    }
    if !forward.is_empty() {
        let mut out = Vec::with_capacity(func.instrs.len());
        for mut instr in func.instrs.drain(..) {
            if let Instr::Copy { dest, .. } = &instr {
                if forward.contains_key(dest) {
                    removed += 1;
                    continue;
                }
            }
            for (&from, &to) in &forward {
                instr.replace_read(from, to);
            }
            out.push(instr);
        }
        func.instrs = out;
    }

    // Dead pure results, found by a reverse liveness sweep.
    let mut used: FxHashSet<ValueId> = FxHashSet::default();
    let mut keep = vec![true; func.instrs.len()];
    for (index, instr) in func.instrs.iter().enumerate().rev() {
        // A fallible instruction keeps its exception edge even if the result
        // is unread.
        let dead = match instr.result() {
            Some(dest) => {
                !used.contains(&dest)
                    && !instr.has_side_effects()
                    && instr.error_target().is_none()
            }
            None => false,
        };
        if dead {
            keep[index] = false;
            removed += 1;
        } else {
            instr.for_each_read(|v| {
                used.insert(v);
            });
        }
    }
    if keep.iter().any(|k| !k) {
        let mut index = 0;
        func.instrs.retain(|_| {
            let k = keep[index];
            index += 1;
            k
        });
    }
    removed
}
