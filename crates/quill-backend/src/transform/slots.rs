//! Slot resolution
//!
//! Partitions surviving identifiers into storage groups and decides where a
//! function's locals live. Grouped mode numbers reference cells, plain
//! values, and iterator records separately; flat mode numbers every value in
//! one sequence. A function's locals move to a heap-allocated per-call
//! structure when the function is a generator or any of its own references
//! are closure-captured or live across a suspension.

use crate::ir::{FunctionIr, Instr, Slot, SlotGroup, SlotCounts, ValueTable, ValueType, VarTable};

pub(super) fn run(func: &mut FunctionIr, values: &ValueTable, vars: &VarTable, grouped: bool) {
    func.heap_frame = func.is_generator
        || vars
            .iter()
            .any(|(_, r)| r.owner == func.id && (r.captured || r.crosses_suspend));

    func.ref_slots.clear();
    func.value_slots.clear();
    let mut counts = SlotCounts::default();

    // Capture stand-ins come first, in closure-argument order; the closure
    // prologue fills them positionally.
    for capture in &func.captures {
        func.ref_slots.insert(capture.inner, counts.refs);
        counts.refs += 1;
    }
    for instr in &func.instrs {
        if let Instr::DeclareRef { var } = instr {
            if !func.ref_slots.contains_key(var) {
                func.ref_slots.insert(*var, counts.refs);
                counts.refs += 1;
            }
        }
    }

    for instr in &func.instrs {
        let Some(dest) = instr.result() else { continue };
        if func.value_slots.contains_key(&dest) {
            continue;
        }
        let group = if grouped && values.ty(dest).intersects(ValueType::ITERATOR) {
            SlotGroup::Iter
        } else {
            SlotGroup::Value
        };
        let index = match group {
            SlotGroup::Iter => {
                let i = counts.iters;
                counts.iters += 1;
                i
            }
            _ => {
                let i = counts.values;
                counts.values += 1;
                i
            }
        };
        func.value_slots.insert(dest, Slot { group, index });
    }

    // The generator return slot is written by suspensions but is never an
    // instruction result, so it needs a slot of its own.
    if let Some(ret) = func.ret_slot {
        func.value_slots.entry(ret).or_insert_with(|| {
            let slot = Slot {
                group: SlotGroup::Value,
                index: counts.values,
            };
            counts.values += 1;
            slot
        });
    }

    func.slot_counts = counts;
}
