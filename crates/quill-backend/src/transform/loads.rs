//! Load optimization
//!
//! Forwards known reference contents within straight-line regions: a load
//! that follows a store (or another load) of the same reference, with
//! nothing invalidating in between, becomes a copy. Labels clear all known
//! contents (a join may arrive with different state); anything that can run
//! user code clears captured references, which a closure may mutate.

use crate::ir::{FunctionIr, Instr, ValueId, VarRefId, VarTable};
use rustc_hash::FxHashMap;

/// Returns the number of loads forwarded.
pub(super) fn run(func: &mut FunctionIr, vars: &VarTable) -> usize {
    let mut known: FxHashMap<VarRefId, ValueId> = FxHashMap::default();
    let mut forwarded = 0;

    let instrs = std::mem::take(&mut func.instrs);
    let mut out = Vec::with_capacity(instrs.len());
    for mut instr in instrs {
        match &instr {
            Instr::Label { .. } => known.clear(),
            Instr::Suspend { .. } | Instr::ResumeDispatch { .. } => known.clear(),
            Instr::StoreRef { var, value } => {
                known.insert(*var, *value);
            }
            Instr::LoadRef { dest, var } => {
                if let Some(&src) = known.get(var) {
                    instr = Instr::Copy { dest: *dest, src };
                    forwarded += 1;
                } else {
                    known.insert(*var, *dest);
                }
            }
            other if other.is_call_like() => {
                known.retain(|&var, _| !vars.get(var).captured);
            }
            _ => {}
        }
        out.push(instr);
    }
    func.instrs = out;
    forwarded
}
