//! Shape of the emitted target text.

use super::harness::*;
use quill_backend::ir::FunctionKind;
use quill_backend::{ModuleBuilder, Options};

fn property_read_module(name: &str) -> ModuleBuilder {
    let mut b = ModuleBuilder::new(name);
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let o = b.new_object(root, None).unwrap();
    let p = b.get_property(root, o, "length").unwrap();
    b.ret(root, Some(p)).unwrap();
    b.end_function(f).unwrap();
    b
}

#[test]
fn test_module_scaffolding() {
    let text = emit(property_read_module("demo"));
    assert!(text.contains("/* module \"demo\" */"));
    assert!(text.contains("#include \"quill_runtime.h\""));
    assert!(text.contains(
        "static qu_value fn0_main(qu_ctx *ctx, qu_value self, int argc, qu_value *argv)"
    ));
    assert!(text.contains("static const char *const qu_atom_names[] = {"));
    assert!(text.contains("    \"length\","));
    assert!(text.contains("static const qu_func_desc qu_funcs[] = {"));
    assert!(text.contains("    { \"main\", fn0_main, 0, QU_FN_ORDINARY, 0 },"));
    assert!(text.contains("qu_module *qu_module_register_demo(qu_ctx *ctx) {"));
    assert!(text.contains("#define qu_atom_length qu_atoms[0]"));
    assert!(text.contains("    qu_module_atoms(m, 1, qu_atom_names, qu_atoms);"));
    assert!(text.contains("    qu_module_funcs(m, 1, qu_funcs);"));
    assert!(text.contains("    return m;"));
    assert!(text.contains("__attribute__((constructor)) static void qu_module_init_demo(void) {"));
    assert!(text.contains("    qu_module_table_add(\"demo\", qu_module_register_demo);"));
}

#[test]
fn test_property_read_uses_cache_and_fast_helper() {
    let text = emit(property_read_module("demo"));
    // The receiver is a fresh object, provably not nullish.
    assert!(text.contains("qu_get_prop_fast(ctx,"));
    assert!(text.contains("qu_atom_length,"));
    assert!(text.contains("static qu_cache_slot qu_prop_cache[1];"));
    assert!(text.contains("&qu_prop_cache[0]"));
    assert!(text.contains("    if (qu_failed(ctx)) goto L0_bail;"));
    assert!(text.contains("L0_bail:;"));
    assert!(text.contains("qu_autorelease(ctx,"));
}

#[test]
fn test_disabled_options_use_checked_helper_without_cache() {
    let text = emit_with(property_read_module("demo"), Options::none());
    assert!(text.contains("qu_get_prop(ctx,"));
    assert!(!text.contains("_fast"));
    assert!(!text.contains("qu_prop_cache"));
}

#[test]
fn test_generator_frame_and_dispatch() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("gen", FunctionKind::Ordinary, None, true)
        .unwrap();
    let a = b.const_number(root, 1.0).unwrap();
    let sent = b.suspend(root, a).unwrap();
    b.ret(root, Some(sent)).unwrap();
    b.end_function(f).unwrap();

    let text = emit(b);
    assert!(text.contains("struct fn0_gen_frame {"));
    assert!(text.contains("    unsigned resume;"));
    assert!(text.contains("qu_gen_frame(ctx, sizeof(struct fn0_gen_frame))"));
    assert!(text.contains("    switch (fr->resume) {"));
    assert!(text.contains("    case 1: goto L2_resume;"));
    assert!(text.contains("    fr->resume = 1;"));
    // Suspension parks the value in the return slot and leaves through the
    // shared yield exit.
    assert!(text.contains("    goto L1_yield;"));
    assert!(text.contains("L1_yield:;"));
    assert!(text.contains("    fr->resume = QU_GEN_DONE;"));
    assert!(text.contains("qu_gen_sent(ctx)"));
    assert!(text.contains("    { \"gen\", fn0_gen, 0, QU_FN_ORDINARY, 1 },"));
}

#[test]
fn test_constructor_signature_carries_new_target() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("Point", FunctionKind::Constructor, None, false)
        .unwrap();
    let target = b.load_name(root, "new.target").unwrap().unwrap();
    b.ret(root, Some(target)).unwrap();
    b.end_function(f).unwrap();

    let text = emit(b);
    assert!(text.contains(
        "static qu_value fn0_Point(qu_ctx *ctx, qu_value self, qu_value new_target, int argc, qu_value *argv);"
    ));
    assert!(text.contains(
        "static qu_value fn0_Point(qu_ctx *ctx, qu_value self, qu_value new_target, int argc, qu_value *argv) {"
    ));
    assert!(text.contains("= new_target;"));
    assert!(!text.contains("qu_new_target(ctx)"));
    assert!(text.contains("QU_FN_CONSTRUCTOR"));
}

#[test]
fn test_dynamic_key_delete_is_checked() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let o = b.new_object(root, None).unwrap();
    let key = b.const_str(root, "answer").unwrap();
    let removed = b.delete_element(root, o, key).unwrap();
    b.ret(root, Some(removed)).unwrap();
    b.end_function(f).unwrap();

    let text = emit(b);
    assert!(text.contains("qu_del_elem(ctx,"));
    assert!(text.contains("    if (qu_failed(ctx)) goto L0_bail;"));
}

#[test]
fn test_closure_capture_prologue_and_construction() {
    let mut b = ModuleBuilder::new("m");
    let (outer, outer_root) = b
        .begin_function("outer", FunctionKind::Ordinary, None, false)
        .unwrap();
    let x = b
        .declare_var(outer_root, "x", quill_backend::ir::VarKind::Function)
        .unwrap();
    let v = b.const_number(outer_root, 1.0).unwrap();
    b.store_var(outer_root, x, v).unwrap();
    let (inner, inner_root) = b
        .begin_function("inner", FunctionKind::Arrow, Some(outer_root), false)
        .unwrap();
    let loaded = b.load_name(inner_root, "x").unwrap().unwrap();
    b.ret(inner_root, Some(loaded)).unwrap();
    b.end_function(inner).unwrap();
    let closure = b.new_function(outer_root, inner).unwrap();
    b.ret(outer_root, Some(closure)).unwrap();
    b.end_function(outer).unwrap();

    let text = emit(b);
    // Captured cells force both functions onto heap frames.
    assert!(text.contains("struct fn0_outer_frame {"));
    assert!(text.contains("fr->r[0] = qu_ref_new(ctx);"));
    assert!(text.contains("qu_ref *caps"));
    assert!(text.contains("= { fr->r[0] };"));
    assert!(text.contains("qu_new_closure(ctx, qu_module_func(ctx, 1), 1, caps"));
    assert!(text.contains("fr->r[0] = qu_closure_capture(ctx, 0);"));
    assert!(text.contains("qu_frame_pop(ctx); return qret; }"));
}

#[test]
fn test_string_constants_are_registered() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let s = b.const_str(root, "hello").unwrap();
    b.ret(root, Some(s)).unwrap();
    b.end_function(f).unwrap();

    let text = emit(b);
    assert!(text.contains("static const char *const qu_string_texts[] = {"));
    assert!(text.contains("    \"hello\","));
    assert!(text.contains("static qu_value qu_string_consts[1];"));
    assert!(text.contains("= qu_string_consts[0];"));
    assert!(text.contains("qu_module_strings(m, 1, qu_string_texts, qu_string_consts);"));
    // The literal is borrowed; returning it takes a reference of its own.
    assert!(text.contains("QU_RETAIN("));
}

#[test]
fn test_plain_ref_helper_toggle() {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let s = b.const_str(root, "hello").unwrap();
    b.ret(root, Some(s)).unwrap();
    b.end_function(f).unwrap();

    let options = Options {
        plain_ref_helpers: true,
        ..Options::default()
    };
    let text = emit_with(b, options);
    assert!(text.contains("qu_retain("));
    assert!(!text.contains("QU_RETAIN("));
}

fn iteration_module() -> ModuleBuilder {
    let mut b = ModuleBuilder::new("m");
    let (f, root) = b
        .begin_function("main", FunctionKind::Ordinary, None, false)
        .unwrap();
    let o = b.new_object(root, None).unwrap();
    let it = b.new_iterator(root, o, false).unwrap();
    let done = b.new_target(f, "done");
    b.iterator_next(root, it, done).unwrap();
    b.emit_label(root, done).unwrap();
    b.ret(root, None).unwrap();
    b.end_function(f).unwrap();
    b
}

#[test]
fn test_grouped_iterators_use_in_place_records() {
    let text = emit(iteration_module());
    assert!(text.contains("qu_iter it[1];"));
    assert!(text.contains("qu_iter_init(ctx, &it[0],"));
    assert!(text.contains("qu_iter_next(ctx, &it[0])"));
    assert!(text.contains("if (qu_iter_done(&it[0])) goto L1_done;"));
}

#[test]
fn test_flat_iterators_are_boxed_values() {
    let text = emit_with(iteration_module(), Options::none());
    assert!(text.contains("qu_iter_open(ctx,"));
    assert!(text.contains("qu_iter_step(ctx,"));
    assert!(text.contains("if (qu_iter_exhausted(ctx)) goto L1_done;"));
    assert!(!text.contains("qu_iter_init"));
}
