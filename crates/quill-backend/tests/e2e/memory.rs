//! Retain/release balance over finalized streams.

use super::harness::*;
use quill_backend::ir::{FunctionKind, Instr, VarKind};
use quill_backend::{ModuleBuilder, Options};

fn property_read_module() -> ModuleBuilder {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let o = b.new_object(root, None).unwrap();
    let p = b.get_property(root, o, "x").unwrap();
    b.ret(root, Some(p)).unwrap();
    b.end_function(f).unwrap();
    b
}

#[test]
fn test_owned_intermediate_is_autoreleased_across_error_edges() {
    let module = finalize(property_read_module());
    // The object stays live across a fallible read, so its release is not
    // reachable on every path; it goes to the pool instead.
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::AutoRelease { .. })),
        1
    );
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::Release { .. })),
        0
    );
    assert_refcount_balanced(&module, 0);
}

#[test]
fn test_balance_holds_with_every_optimization_disabled() {
    let module = finalize_with(property_read_module(), Options::none());
    assert!(count_instrs(&module, 0, |i| matches!(i, Instr::AutoRelease { .. })) >= 1);
    assert_refcount_balanced(&module, 0);
}

#[test]
fn test_borrowed_literal_is_retained_when_returned() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let s = b.const_str(root, "hi").unwrap();
    b.ret(root, Some(s)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::Retain { .. })),
        1
    );
    assert_refcount_balanced(&module, 0);
}

#[test]
fn test_unused_owned_object_is_released_in_place() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    b.new_object(root, None).unwrap();
    b.ret(root, None).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    // Nothing between definition and last use: a plain release suffices.
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::Release { .. })),
        1
    );
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::AutoRelease { .. })),
        0
    );
    assert_refcount_balanced(&module, 0);
}

#[test]
fn test_double_store_retains_all_but_the_final_consumption() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    // Declarations first, so neither store sits at its declaration and the
    // reference demotion leaves both cells alone.
    let x = b.declare_var(root, "x", VarKind::Block).unwrap();
    let y = b.declare_var(root, "y", VarKind::Block).unwrap();
    let o = b.new_object(root, None).unwrap();
    b.store_var(root, x, o).unwrap();
    b.store_var(root, y, o).unwrap();
    b.ret(root, None).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::Retain { .. })),
        1
    );
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::StoreRef { .. })),
        2
    );
    assert_refcount_balanced(&module, 0);
}
