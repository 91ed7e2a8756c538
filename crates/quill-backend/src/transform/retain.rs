//! Retain/release insertion
//!
//! Ownership convention: instructions that produce a fresh or loaded heap
//! value hand their result to the stream with one reference (owned).
//! Argument, receiver, and literal loads are borrowed. Consuming positions
//! (return, throw, suspend, store into a reference cell) take the reference
//! with them. The pass balances the two: a consumer that is not the value's
//! final use gets its own retain, a borrowed value in a final consuming
//! position gets one too, and an owned value that is never consumed is
//! released after its last use. When the live range crosses control flow,
//! the release is not provably reachable on every path, so the value is
//! handed to the auto-release pool at its definition instead.

use crate::error::CompileResult;
use crate::ir::{FunctionIr, Instr, ValueId, ValueTable, ValueType};
use rustc_hash::FxHashMap;

fn produces_owned(instr: &Instr) -> bool {
    match instr {
        Instr::GetProperty { .. }
        | Instr::GetElement { .. }
        | Instr::Call { .. }
        | Instr::Construct { .. }
        | Instr::NewObject { .. }
        | Instr::NewFunction { .. }
        | Instr::NewClass { .. }
        | Instr::NewIterator { .. }
        | Instr::IteratorNext { .. }
        | Instr::CatchException { .. }
        | Instr::ResumeValue { .. }
        | Instr::LoadRef { .. }
        | Instr::Retain { .. } => true,
        // A retainable operator result is a fresh heap value (e.g. string
        // concatenation).
        Instr::Unary { .. } | Instr::Binary { .. } => true,
        _ => false,
    }
}

fn consumed_operand(instr: &Instr) -> Option<ValueId> {
    match instr {
        Instr::Return { value: Some(v) } => Some(*v),
        Instr::Throw { value, .. } => Some(*value),
        Instr::Suspend { value, .. } => Some(*value),
        Instr::StoreRef { value, .. } => Some(*value),
        _ => None,
    }
}

/// No label, jump, suspension, or error edge between definition and last
/// use: a trailing release is reached on every path.
fn clean_window(instrs: &[Instr], def: usize, last_use: usize) -> bool {
    instrs[def + 1..=last_use].iter().all(|instr| {
        !matches!(
            instr,
            Instr::Label { .. }
                | Instr::Jump { .. }
                | Instr::Branch { .. }
                | Instr::Suspend { .. }
                | Instr::ResumeDispatch { .. }
        ) && instr.error_target().is_none()
    })
}

struct Range {
    def: usize,
    last_use: usize,
    owned: bool,
}

pub(super) fn run(func: &mut FunctionIr, values: &mut ValueTable) -> CompileResult<()> {
    let mut ranges: FxHashMap<ValueId, Range> = FxHashMap::default();
    let mut consumes: FxHashMap<ValueId, Vec<usize>> = FxHashMap::default();

    for (index, instr) in func.instrs.iter().enumerate() {
        if let Some(dest) = instr.result() {
            // Iterator state is not a counted value: the runtime closes it
            // when iteration ends.
            let ty = values.ty(dest);
            if ty.is_retainable()
                && !ty.intersects(ValueType::ITERATOR)
                && !values.is_assignable(dest)
            {
                ranges.insert(
                    dest,
                    Range {
                        def: index,
                        last_use: index,
                        owned: produces_owned(instr),
                    },
                );
            }
        }
        instr.for_each_read(|v| {
            if let Some(range) = ranges.get_mut(&v) {
                range.last_use = index;
            }
        });
        if let Some(v) = consumed_operand(instr) {
            consumes.entry(v).or_default().push(index);
        }
    }

    let mut before: FxHashMap<usize, Vec<Instr>> = FxHashMap::default();
    let mut after: FxHashMap<usize, Vec<Instr>> = FxHashMap::default();
    let mut rewrites: Vec<(usize, ValueId, ValueId)> = Vec::new();

    let mut ordered: Vec<(ValueId, &Range)> = ranges.iter().map(|(&v, r)| (v, r)).collect();
    ordered.sort_by_key(|(_, r)| r.def);

    for (value, range) in ordered {
        let sites = consumes.get(&value).cloned().unwrap_or_default();
        let consumed_at_last = sites.last() == Some(&range.last_use);

        for &site in &sites {
            let final_site = consumed_at_last && site == range.last_use;
            // The final consumer inherits an owned value's reference; every
            // other consumption needs one of its own.
            let needs_retain = !final_site || !range.owned;
            if needs_retain {
                let owner = values.owner(value);
                let ty = values.ty(value);
                let retained = values.alloc(owner, ty);
                if let Some(slot) = func.value_slots.get(&value).copied() {
                    func.value_slots.insert(retained, slot);
                }
                before.entry(site).or_default().push(Instr::Retain {
                    dest: retained,
                    value,
                });
                rewrites.push((site, value, retained));
            }
        }

        if range.owned && !consumed_at_last {
            if clean_window(&func.instrs, range.def, range.last_use) {
                after
                    .entry(range.last_use)
                    .or_default()
                    .push(Instr::Release { value });
            } else {
                after
                    .entry(range.def)
                    .or_default()
                    .push(Instr::AutoRelease { value });
            }
        }
    }

    if before.is_empty() && after.is_empty() && rewrites.is_empty() {
        return Ok(());
    }

    let mut out = Vec::with_capacity(func.instrs.len() + before.len() + after.len());
    for (index, mut instr) in func.instrs.drain(..).enumerate() {
        if let Some(pre) = before.remove(&index) {
            out.extend(pre);
        }
        for &(site, from, to) in &rewrites {
            if site == index {
                instr.replace_read(from, to);
            }
        }
        out.push(instr);
        if let Some(post) = after.remove(&index) {
            out.extend(post);
        }
    }
    func.instrs = out;
    Ok(())
}
