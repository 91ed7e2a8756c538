//! Generator lowering: re-entry dispatch, completion, and persistent
//! reference cells.

use super::harness::*;
use quill_backend::ir::{FunctionKind, Instr, VarKind};
use quill_backend::ModuleBuilder;

#[test]
fn test_dispatch_precedes_body_and_covers_every_suspension() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("gen", FunctionKind::Ordinary, None, true)
        .unwrap();
    let a = b.const_number(root, 1.0).unwrap();
    b.suspend(root, a).unwrap();
    let c = b.const_number(root, 2.0).unwrap();
    b.suspend(root, c).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    let func = &module.functions[0];
    assert!(func.heap_frame);
    assert_eq!(func.resume_points.len(), 2);

    let dispatch_at = func
        .instrs
        .iter()
        .position(|i| matches!(i, Instr::ResumeDispatch { .. }))
        .unwrap();
    let first_suspend = func
        .instrs
        .iter()
        .position(|i| matches!(i, Instr::Suspend { .. }))
        .unwrap();
    assert!(dispatch_at < first_suspend);
    let Instr::ResumeDispatch { targets } = &func.instrs[dispatch_at] else {
        unreachable!()
    };
    assert_eq!(*targets, func.resume_points);
}

fn parameterized_generator() -> (ModuleBuilder, quill_backend::ir::VarRefId) {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("gen", FunctionKind::Ordinary, None, true)
        .unwrap();
    let n = b.declare_param(f, "n").unwrap();
    let tick = b.const_number(root, 0.0).unwrap();
    b.suspend(root, tick).unwrap();
    let reloaded = b.load_var(root, n).unwrap();
    b.ret(root, Some(reloaded)).unwrap();
    b.end_function(f).unwrap();
    (b, n)
}

#[test]
fn test_dispatch_precedes_parameter_materialization() {
    let (b, n) = parameterized_generator();
    let module = finalize(b);
    let func = &module.functions[0];

    // A resume jumps past the entry code; re-running the parameter
    // prologue would reset a cell the first activation already filled.
    let dispatch_at = func
        .instrs
        .iter()
        .position(|i| matches!(i, Instr::ResumeDispatch { .. }))
        .unwrap();
    let first_entry = func
        .instrs
        .iter()
        .position(|i| {
            matches!(
                i,
                Instr::LoadArg { .. } | Instr::DeclareRef { .. } | Instr::StoreRef { .. }
            )
        })
        .unwrap();
    assert!(dispatch_at < first_entry);
    assert!(module.vars.get(n).crosses_suspend);
}

#[test]
fn test_emitted_dispatch_precedes_cell_allocation() {
    let (b, _) = parameterized_generator();
    let text = emit(b);
    let dispatch = text.find("switch (fr->resume)").unwrap();
    let cell = text.find("qu_ref_new(ctx)").unwrap();
    assert!(dispatch < cell);
}

#[test]
fn test_reference_crossing_suspension_keeps_its_cell() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("gen", FunctionKind::Ordinary, None, true)
        .unwrap();
    let o = b.new_object(root, None).unwrap();
    let x = b.declare_var(root, "x", VarKind::Block).unwrap();
    b.store_var(root, x, o).unwrap();
    let tick = b.const_number(root, 0.0).unwrap();
    b.suspend(root, tick).unwrap();
    let reloaded = b.load_var(root, x).unwrap();
    b.ret(root, Some(reloaded)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    // The single-store demotion must not fire: the content has to survive
    // the suspension in persistent storage.
    assert!(module.vars.get(x).crosses_suspend);
    assert!(count_instrs(&module, 0, |i| matches!(i, Instr::StoreRef { .. })) >= 1);
    assert!(count_instrs(&module, 0, |i| matches!(i, Instr::LoadRef { .. })) >= 1);
    assert!(module.functions[0].ref_slots.contains_key(&x));
}

#[test]
fn test_explicit_return_marks_generator_finished() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("gen", FunctionKind::Ordinary, None, true)
        .unwrap();
    let a = b.const_number(root, 1.0).unwrap();
    b.suspend(root, a).unwrap();
    let result = b.const_number(root, 5.0).unwrap();
    b.ret(root, Some(result)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    let func = &module.functions[0];
    let finish_at = func
        .instrs
        .iter()
        .position(|i| matches!(i, Instr::FinishGenerator))
        .unwrap();
    assert!(matches!(
        func.instrs[finish_at + 1],
        Instr::Return { value: Some(_) }
    ));
}

#[test]
fn test_sent_value_is_read_at_the_resume_point() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("gen", FunctionKind::Ordinary, None, true)
        .unwrap();
    let a = b.const_number(root, 1.0).unwrap();
    let sent = b.suspend(root, a).unwrap();
    b.ret(root, Some(sent)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    let func = &module.functions[0];
    let resume = func.resume_points[0];
    let resume_at = func
        .instrs
        .iter()
        .position(|i| matches!(i, Instr::Label { target } if *target == resume))
        .unwrap();
    assert!(matches!(
        func.instrs[resume_at + 1],
        Instr::ResumeValue { .. }
    ));
}
