//! Test harness for end-to-end backend runs
//!
//! Helpers for finalizing authored modules, searching finalized streams,
//! and simulating reference counts over straight-line functions.

use quill_backend::ir::{Instr, ModuleIr, ValueId, ValueType};
use quill_backend::{Backend, ModuleBuilder, Options};
use std::collections::HashMap;

/// Finalize with default options.
pub fn finalize(builder: ModuleBuilder) -> ModuleIr {
    Backend::new(Options::default())
        .finalize(builder)
        .expect("finalize failed")
}

/// Finalize with explicit options.
pub fn finalize_with(builder: ModuleBuilder, options: Options) -> ModuleIr {
    Backend::new(options).finalize(builder).expect("finalize failed")
}

/// Full compile to target text with default options.
pub fn emit(builder: ModuleBuilder) -> String {
    emit_with(builder, Options::default())
}

/// Full compile to target text with explicit options.
pub fn emit_with(builder: ModuleBuilder, options: Options) -> String {
    Backend::new(options).compile(builder).expect("compile failed")
}

/// Count instructions of a function matching a predicate.
pub fn count_instrs(module: &ModuleIr, func: usize, pred: impl Fn(&Instr) -> bool) -> usize {
    module.functions[func].instrs.iter().filter(|i| pred(i)).count()
}

fn produces_owned(instr: &Instr) -> bool {
    matches!(
        instr,
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
            | Instr::Retain { .. }
            | Instr::Unary { .. }
            | Instr::Binary { .. }
    )
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

/// Simulate execution of a straight-line function over a reference-counted
/// value model and assert every retainable value nets to zero. Panics if
/// the function branches; the model is linear.
pub fn assert_refcount_balanced(module: &ModuleIr, func: usize) {
    let func = &module.functions[func];
    assert!(
        !func.instrs.iter().any(|i| matches!(i, Instr::Branch { .. } | Instr::Jump { .. })),
        "{}: refcount simulation needs a straight-line stream",
        func.name
    );

    // Iterator records are runtime-managed, not counted.
    let counted = |v: ValueId| {
        let ty = module.values.ty(v);
        ty.is_retainable() && !ty.intersects(ValueType::ITERATOR)
    };

    let mut counts: HashMap<ValueId, i64> = HashMap::new();
    for instr in &func.instrs {
        // The exception epilogue is unreachable on the simulated path.
        if matches!(instr, Instr::Propagate) {
            break;
        }
        if let Some(dest) = instr.result() {
            if counted(dest) && produces_owned(instr) {
                *counts.entry(dest).or_insert(0) += 1;
            }
        }
        match instr {
            Instr::Release { value } | Instr::AutoRelease { value } => {
                *counts.entry(*value).or_insert(0) -= 1;
            }
            Instr::ReleaseMany { values } => {
                for value in values {
                    *counts.entry(*value).or_insert(0) -= 1;
                }
            }
            _ => {
                if let Some(v) = consumed_operand(instr) {
                    if counted(v) {
                        *counts.entry(v).or_insert(0) -= 1;
                    }
                }
            }
        }
    }

    for (value, count) in counts {
        assert_eq!(
            count, 0,
            "{}: value {} leaves the function with a net count of {}",
            func.name, value, count
        );
    }
}
