//! Auto-release placement
//!
//! Auto-released values sit in a pool drained at function exit, so their
//! position only matters for batching. This pass sinks each auto-release to
//! the end of its straight-line region (just before the next label or
//! control transfer) so the emitter can hand the pool a run of values at
//! once.

use crate::ir::{FunctionIr, Instr};

pub(super) fn run(func: &mut FunctionIr) {
    let instrs = std::mem::take(&mut func.instrs);
    let mut out = Vec::with_capacity(instrs.len());
    let mut pending: Vec<Instr> = Vec::new();

    for instr in instrs {
        if matches!(instr, Instr::AutoRelease { .. }) {
            pending.push(instr);
            continue;
        }
        // Flush before anything that can transfer control away; sinking a
        // registration past a taken edge would skip it.
        let transfers = matches!(
            instr,
            Instr::Label { .. } | Instr::Branch { .. } | Instr::Suspend { .. }
        ) || instr.ends_flow()
            || instr.error_target().is_some();
        if transfers {
            out.append(&mut pending);
        }
        out.push(instr);
    }
    out.append(&mut pending);
    func.instrs = out;
}
