//! Release merging
//!
//! Coalesces runs of adjacent single-value releases into one vectorized
//! release-many instruction, shrinking the emitted call count.

use crate::ir::{FunctionIr, Instr};

pub(super) fn run(func: &mut FunctionIr) {
    let instrs = std::mem::take(&mut func.instrs);
    let mut out = Vec::with_capacity(instrs.len());
    let mut run: Vec<crate::ir::ValueId> = Vec::new();

    let flush = |out: &mut Vec<Instr>, run: &mut Vec<crate::ir::ValueId>| {
        match run.len() {
            0 => {}
            1 => out.push(Instr::Release { value: run[0] }),
            _ => out.push(Instr::ReleaseMany {
                values: std::mem::take(run),
            }),
        }
        run.clear();
    };

    for instr in instrs {
        match instr {
            Instr::Release { value } => run.push(value),
            Instr::ReleaseMany { values } => run.extend(values),
            other => {
                flush(&mut out, &mut run);
                out.push(other);
            }
        }
    }
    flush(&mut out, &mut run);
    func.instrs = out;
}
