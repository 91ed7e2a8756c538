//! Variable-reference optimization
//!
//! Demotes reference cells back to plain values where the indirection is
//! unobservable: the reference was never captured by a closure, never lives
//! across a generator suspension, and is stored exactly once, at its
//! declaration. Loads of such a reference become copies of the stored value;
//! the declare and store disappear.

use crate::ir::{FunctionIr, Instr, ValueId, VarRefId, VarTable};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Default)]
struct RefStats {
    declares: u32,
    stores: u32,
    store_follows_declare: bool,
    stored_value: Option<ValueId>,
}

/// Returns the number of reference cells removed.
pub(super) fn run(func: &mut FunctionIr, vars: &VarTable) -> usize {
    let mut stats: FxHashMap<VarRefId, RefStats> = FxHashMap::default();
    let mut previous_declare: Option<VarRefId> = None;
    for instr in &func.instrs {
        match instr {
            Instr::DeclareRef { var } => {
                stats.entry(*var).or_default().declares += 1;
                previous_declare = Some(*var);
                continue;
            }
            Instr::StoreRef { var, value } => {
                let s = stats.entry(*var).or_default();
                s.stores += 1;
                s.stored_value = Some(*value);
                if previous_declare == Some(*var) {
                    s.store_follows_declare = true;
                }
            }
            _ => {}
        }
        previous_declare = None;
    }

    let removable: FxHashSet<VarRefId> = stats
        .iter()
        .filter(|(&var, s)| {
            let cell = vars.get(var);
            !cell.captured
                && !cell.crosses_suspend
                && s.declares == 1
                && s.stores == 1
                && s.store_follows_declare
        })
        .map(|(&var, _)| var)
        .collect();
    if removable.is_empty() {
        return 0;
    }

    let mut out = Vec::with_capacity(func.instrs.len());
    for instr in func.instrs.drain(..) {
        match instr {
            Instr::DeclareRef { var } | Instr::StoreRef { var, .. }
                if removable.contains(&var) => {}
            Instr::LoadRef { dest, var } if removable.contains(&var) => {
                // Removable implies exactly one store was recorded.
                match stats[&var].stored_value {
                    Some(src) => out.push(Instr::Copy { dest, src }),
                    None => out.push(Instr::LoadRef { dest, var }),
                }
            }
            other => out.push(other),
        }
    }
    func.instrs = out;
    removable.len()
}
