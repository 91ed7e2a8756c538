//! Pass pipeline behavior observed through the finalized IR.

use super::harness::*;
use quill_backend::ir::{BinaryOp, BranchMode, Constant, FunctionKind, Instr, VarKind};
use quill_backend::{ModuleBuilder, Options};

#[test]
fn test_constant_arithmetic_folds_to_a_single_literal() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let two = b.const_number(root, 2.0).unwrap();
    let three = b.const_number(root, 3.0).unwrap();
    let sum = b.binary(root, BinaryOp::Add, two, three).unwrap();
    b.ret(root, Some(sum)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::Binary { .. })),
        0
    );
    // The operand loads die with the operator.
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::LoadConst { .. })),
        1
    );
    assert!(module.functions[0].instrs.iter().any(|i| matches!(
        i,
        Instr::LoadConst {
            value: Constant::Number(n),
            ..
        } if *n == 5.0
    )));
}

#[test]
fn test_decided_branches_become_jumps_or_vanish() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let taken = b.new_target(f, "then");
    let never = b.new_target(f, "skip");
    let t = b.const_bool(root, true).unwrap();
    b.branch(root, t, BranchMode::Truthy, true, taken).unwrap();
    b.branch(root, t, BranchMode::Truthy, false, never).unwrap();
    b.emit_label(root, taken).unwrap();
    b.emit_label(root, never).unwrap();
    b.ret(root, None).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    let func = &module.functions[0];
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::Branch { .. })),
        0
    );
    assert!(func
        .instrs
        .iter()
        .any(|i| matches!(i, Instr::Jump { target } if *target == taken)));
    assert!(!func
        .instrs
        .iter()
        .any(|i| matches!(i, Instr::Jump { target } if *target == never)));
}

fn single_store_module() -> ModuleBuilder {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let o = b.new_object(root, None).unwrap();
    let x = b.declare_var(root, "x", VarKind::Block).unwrap();
    b.store_var(root, x, o).unwrap();
    let loaded = b.load_var(root, x).unwrap();
    b.ret(root, Some(loaded)).unwrap();
    b.end_function(f).unwrap();
    b
}

#[test]
fn test_single_store_reference_is_demoted_to_its_value() {
    let module = finalize(single_store_module());
    let func = &module.functions[0];
    assert!(!func.instrs.iter().any(|i| matches!(
        i,
        Instr::DeclareRef { .. } | Instr::StoreRef { .. } | Instr::LoadRef { .. }
    )));
    assert!(func
        .instrs
        .iter()
        .any(|i| matches!(i, Instr::Return { value: Some(_) })));
}

#[test]
fn test_disabled_pipeline_lowers_the_stream_as_authored() {
    let module = finalize_with(single_store_module(), Options::none());
    let func = &module.functions[0];
    assert!(func.instrs.iter().any(|i| matches!(i, Instr::DeclareRef { .. })));
    assert!(func.instrs.iter().any(|i| matches!(i, Instr::StoreRef { .. })));
    assert!(func.instrs.iter().any(|i| matches!(i, Instr::LoadRef { .. })));
}

#[test]
fn test_reload_of_resident_content_is_forwarded() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let x = b.declare_var(root, "x", VarKind::Block).unwrap();
    let first = b.const_number(root, 1.0).unwrap();
    b.store_var(root, x, first).unwrap();
    let second = b.const_number(root, 2.0).unwrap();
    b.store_var(root, x, second).unwrap();
    let loaded = b.load_var(root, x).unwrap();
    b.ret(root, Some(loaded)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    let func = &module.functions[0];
    // The cell survives (two stores) but the reload collapses to the value
    // still in hand.
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::StoreRef { .. })),
        2
    );
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::LoadRef { .. })),
        0
    );
    assert!(func
        .instrs
        .iter()
        .any(|i| matches!(i, Instr::Return { value: Some(_) })));
}

#[test]
fn test_property_reads_get_module_wide_cache_slots() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let o = b.new_object(root, None).unwrap();
    let a = b.get_property(root, o, "a").unwrap();
    let second = b.get_property(root, a, "a").unwrap();
    b.ret(root, Some(second)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    assert_eq!(module.property_cache_size, 2);
    let slots: Vec<_> = module.functions[0]
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::GetProperty { cache, .. } => Some(*cache),
            _ => None,
        })
        .collect();
    assert_eq!(slots, vec![Some(0), Some(1)]);
}

#[test]
fn test_cache_allocation_is_skipped_when_disabled() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let o = b.new_object(root, None).unwrap();
    let p = b.get_property(root, o, "a").unwrap();
    b.ret(root, Some(p)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize_with(b, Options::none());
    assert_eq!(module.property_cache_size, 0);
    assert!(module.functions[0]
        .instrs
        .iter()
        .all(|i| !matches!(i, Instr::GetProperty { cache: Some(_), .. })));
}
