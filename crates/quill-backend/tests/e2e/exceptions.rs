//! Exception routing through nested try constructs.

use super::harness::*;
use quill_backend::ir::{FunctionKind, Instr};
use quill_backend::ModuleBuilder;

#[test]
fn test_nested_try_routes_each_throw_one_level_out() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();

    let outer = b.begin_try(root, true, false).unwrap();
    let inner = b.begin_try(outer.try_scope, true, false).unwrap();
    let boom = b.const_number(inner.try_scope, 1.0).unwrap();
    b.throw(inner.try_scope, boom).unwrap();
    // Failing inside the inner catch arm escalates to the outer construct.
    let inner_caught = inner.caught.unwrap();
    b.throw(inner.catch_scope.unwrap(), inner_caught).unwrap();
    b.end_try(inner).unwrap();
    let outer_caught = outer.caught.unwrap();
    b.ret(outer.catch_scope.unwrap(), Some(outer_caught)).unwrap();
    b.end_try(outer).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    let func = &module.functions[0];
    let throw_targets: Vec<_> = func
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::Throw { on_error, .. } => Some(*on_error),
            _ => None,
        })
        .collect();
    assert_eq!(throw_targets.len(), 2);
    assert_ne!(throw_targets[0], throw_targets[1]);
    // Both targets are catch entries: a label followed by the exception
    // transfer into a local.
    for target in throw_targets {
        assert_eq!(target.tag, "catch");
        let at = func
            .instrs
            .iter()
            .position(|i| matches!(i, Instr::Label { target: t } if *t == target))
            .unwrap();
        assert!(matches!(func.instrs[at + 1], Instr::CatchException { .. }));
    }
}

#[test]
fn test_catch_arm_failure_lands_on_finally() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();

    let block = b.begin_try(root, true, true).unwrap();
    let boom = b.const_number(block.try_scope, 1.0).unwrap();
    b.throw(block.try_scope, boom).unwrap();
    let caught = block.caught.unwrap();
    let message = b
        .get_property(block.catch_scope.unwrap(), caught, "message")
        .unwrap();
    b.ret(block.catch_scope.unwrap(), Some(message)).unwrap();
    b.end_try(block).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    let func = &module.functions[0];
    let get_target = func
        .instrs
        .iter()
        .find_map(|i| match i {
            Instr::GetProperty { on_error, .. } => Some(*on_error),
            _ => None,
        })
        .unwrap();
    assert_eq!(get_target.tag, "finally");
    // The finally arm re-raises anything still pending to the function
    // epilogue.
    let reraise = func
        .instrs
        .iter()
        .find_map(|i| match i {
            Instr::RaisePending { target } => Some(*target),
            _ => None,
        })
        .unwrap();
    assert_eq!(reraise.tag, "bail");
}

#[test]
fn test_try_finally_routes_throw_to_finally_with_exception_pending() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();

    let block = b.begin_try(root, false, true).unwrap();
    let boom = b.const_number(block.try_scope, 1.0).unwrap();
    b.throw(block.try_scope, boom).unwrap();
    b.end_try(block).unwrap();
    b.end_function(f).unwrap();

    let module = finalize(b);
    let func = &module.functions[0];
    let throw_target = func
        .instrs
        .iter()
        .find_map(|i| match i {
            Instr::Throw { on_error, .. } => Some(*on_error),
            _ => None,
        })
        .unwrap();
    assert_eq!(throw_target.tag, "finally");
    // No catch arm anywhere in the stream.
    assert_eq!(
        count_instrs(&module, 0, |i| matches!(i, Instr::CatchException { .. })),
        0
    );
    // Arm order in the flattened stream: finally entry, then the join.
    let finally_at = func
        .instrs
        .iter()
        .position(|i| matches!(i, Instr::Label { target } if *target == throw_target))
        .unwrap();
    let end_at = func
        .instrs
        .iter()
        .position(|i| matches!(i, Instr::Label { target } if target.tag == "try_end"))
        .unwrap();
    assert!(finally_at < end_at);
}
