//! Name resolution and closure conversion, driven through the public
//! authoring surface.

use super::harness::*;
use quill_backend::error::CompileError;
use quill_backend::ir::{Constant, FunctionKind, Instr, VarKind};
use quill_backend::ModuleBuilder;

#[test]
fn test_capture_is_memoized_per_outer_reference() {
    let mut b = ModuleBuilder::new("m");
    let (outer, outer_root) = b
        .begin_function("outer", FunctionKind::Ordinary, None, false)
        .unwrap();
    let x = b.declare_var(outer_root, "x", VarKind::Function).unwrap();
    let v = b.const_number(outer_root, 1.0).unwrap();
    b.store_var(outer_root, x, v).unwrap();

    let (inner, inner_root) = b
        .begin_function("inner", FunctionKind::Arrow, Some(outer_root), false)
        .unwrap();
    b.load_name(inner_root, "x").unwrap().unwrap();
    let again = b.load_name(inner_root, "x").unwrap().unwrap();
    b.ret(inner_root, Some(again)).unwrap();
    b.end_function(inner).unwrap();

    let closure = b.new_function(outer_root, inner).unwrap();
    b.ret(outer_root, Some(closure)).unwrap();
    b.end_function(outer).unwrap();

    let module = finalize(b);
    // Two lookups, one closure argument.
    assert_eq!(module.functions[1].captures.len(), 1);
    assert_eq!(module.functions[1].captures[0].name, "x");
    assert!(module.vars.get(x).captured);
    let captures = module.functions[0]
        .instrs
        .iter()
        .find_map(|i| match i {
            Instr::NewFunction { captures, .. } => Some(captures.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(captures, vec![x]);
}

#[test]
fn test_capture_chains_through_intermediate_function() {
    let mut b = ModuleBuilder::new("m");
    let (outer, outer_root) = b
        .begin_function("outer", FunctionKind::Ordinary, None, false)
        .unwrap();
    let x = b.declare_var(outer_root, "x", VarKind::Function).unwrap();
    let v = b.const_number(outer_root, 1.0).unwrap();
    b.store_var(outer_root, x, v).unwrap();

    let (mid, mid_root) = b
        .begin_function("mid", FunctionKind::Ordinary, Some(outer_root), false)
        .unwrap();
    let (inner, inner_root) = b
        .begin_function("inner", FunctionKind::Ordinary, Some(mid_root), false)
        .unwrap();
    let loaded = b.load_name(inner_root, "x").unwrap().unwrap();
    b.ret(inner_root, Some(loaded)).unwrap();
    b.end_function(inner).unwrap();
    b.end_function(mid).unwrap();
    b.end_function(outer).unwrap();

    let module = finalize(b);
    // The intermediate function carries the cell even though it never
    // touches the name itself.
    let mid_ir = &module.functions[1];
    let inner_ir = &module.functions[2];
    assert_eq!(mid_ir.captures.len(), 1);
    assert_eq!(mid_ir.captures[0].outer, x);
    assert_eq!(inner_ir.captures.len(), 1);
    assert_eq!(inner_ir.captures[0].outer, mid_ir.captures[0].inner);
}

#[test]
fn test_receiver_behind_function_boundary_is_uncapturable() {
    let mut b = ModuleBuilder::new("m");
    let (_, outer_root) = b
        .begin_function("outer", FunctionKind::Ordinary, None, false)
        .unwrap();
    let (_, inner_root) = b
        .begin_function("inner", FunctionKind::Arrow, Some(outer_root), false)
        .unwrap();
    // Arrows have no receiver of their own; resolving one across the
    // boundary cannot be expressed as a cell capture.
    match b.load_name(inner_root, "this") {
        Err(CompileError::UncapturableBinding { name }) => assert_eq!(name, "this"),
        other => panic!("unexpected resolution: {:?}", other),
    }
}

#[test]
fn test_receiver_is_materialized_once() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    b.load_name(root, "this").unwrap().unwrap();
    let receiver = b.load_name(root, "this").unwrap().unwrap();
    b.ret(root, Some(receiver)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::LoadThis { .. })),
        1
    );
}

#[test]
fn test_computed_bindings_reject_stores() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let v = b.const_number(root, 1.0).unwrap();

    // The receiver is not a storage cell.
    match b.store_name(root, "this", v) {
        Err(CompileError::NotAssignable { name }) => assert_eq!(name, "this"),
        other => panic!("unexpected store result: {:?}", other),
    }
    // Intrinsic constants are read-only.
    match b.store_name(root, "undefined", v) {
        Err(CompileError::NotAssignable { name }) => assert_eq!(name, "undefined"),
        other => panic!("unexpected store result: {:?}", other),
    }
    // Declared names accept stores; free names fall through to the host.
    let x = b.declare_var(root, "x", VarKind::Function).unwrap();
    assert_eq!(b.store_name(root, "x", v).unwrap(), Some(()));
    assert!(b.store_name(root, "no_such_global", v).unwrap().is_none());
    let loaded = b.load_var(root, x).unwrap();
    b.ret(root, Some(loaded)).unwrap();
    b.end_function(f).unwrap();
    finalize(b);
}

#[test]
fn test_intrinsic_name_resolves_to_literal() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    assert!(b.load_name(root, "no_such_global").unwrap().is_none());
    let undef = b.load_name(root, "undefined").unwrap().unwrap();
    b.ret(root, Some(undef)).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    assert!(module.functions[0].instrs.iter().any(|i| matches!(
        i,
        Instr::LoadConst {
            value: Constant::Undefined,
            ..
        }
    )));
}
