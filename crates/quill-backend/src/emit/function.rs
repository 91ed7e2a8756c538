//! Per-function emission
//!
//! One visitor over the finalized stream. Every fallible runtime call is
//! followed by a failure test jumping to the instruction's resolved
//! exception target; labels become C labels and jumps become gotos, so the
//! stream's control flow maps one-to-one onto the output.

use super::{function_symbol, param_list, Emitter};
use crate::error::{CompileError, CompileResult};
use crate::ir::{
    BinaryOp, BranchMode, CallArgs, Constant, FunctionIr, Instr, JumpTarget, Slot, SlotGroup,
    UnaryOp, ValueId, ValueType, VarRefId,
};

fn c_number(n: f64) -> String {
    if n.is_nan() {
        "QU_NAN".to_string()
    } else if n == f64::INFINITY {
        "QU_INF".to_string()
    } else if n == f64::NEG_INFINITY {
        "(-QU_INF)".to_string()
    } else {
        format!("{:?}", n)
    }
}

fn binary_helper(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "qu_add",
        BinaryOp::Sub => "qu_sub",
        BinaryOp::Mul => "qu_mul",
        BinaryOp::Div => "qu_div",
        BinaryOp::Mod => "qu_mod",
        BinaryOp::Eq => "qu_eq",
        BinaryOp::StrictEq => "qu_strict_eq",
        BinaryOp::Ne => "qu_ne",
        BinaryOp::StrictNe => "qu_strict_ne",
        BinaryOp::Lt => "qu_lt",
        BinaryOp::Le => "qu_le",
        BinaryOp::Gt => "qu_gt",
        BinaryOp::Ge => "qu_ge",
        BinaryOp::BitAnd => "qu_bitand",
        BinaryOp::BitOr => "qu_bitor",
        BinaryOp::BitXor => "qu_bitxor",
        BinaryOp::Shl => "qu_shl",
        BinaryOp::Shr => "qu_shr",
        BinaryOp::Ushr => "qu_ushr",
        BinaryOp::InstanceOf => "qu_instanceof",
        BinaryOp::In => "qu_in",
    }
}

/// Slot-addressing context for one function.
struct Locals<'f> {
    func: &'f FunctionIr,
}

impl<'f> Locals<'f> {
    fn heap(&self) -> bool {
        self.func.heap_frame
    }

    fn slot(&self, v: ValueId) -> CompileResult<Slot> {
        self.func.value_slots.get(&v).copied().ok_or_else(|| {
            CompileError::internal(format!("{}: value {} has no slot", self.func.name, v))
        })
    }

    fn val(&self, v: ValueId) -> CompileResult<String> {
        let slot = self.slot(v)?;
        let prefix = if self.heap() { "fr->" } else { "" };
        match slot.group {
            SlotGroup::Value => Ok(format!("{}v[{}]", prefix, slot.index)),
            SlotGroup::Iter => Err(CompileError::internal(format!(
                "{}: iterator {} read as plain value",
                self.func.name, v
            ))),
            SlotGroup::Ref => Err(CompileError::internal(format!(
                "{}: reference slot {} read as plain value",
                self.func.name, v
            ))),
        }
    }

    fn iter_rec(&self, v: ValueId) -> CompileResult<String> {
        let slot = self.slot(v)?;
        let prefix = if self.heap() { "fr->" } else { "" };
        match slot.group {
            SlotGroup::Iter => Ok(format!("&{}it[{}]", prefix, slot.index)),
            _ => Err(CompileError::internal(format!(
                "{}: value {} is not an iterator record",
                self.func.name, v
            ))),
        }
    }

    /// Whether iterator state for `v` is an in-place record (grouped mode)
    /// or a boxed value (flat mode).
    fn iter_is_record(&self, v: ValueId) -> bool {
        matches!(
            self.func.value_slots.get(&v),
            Some(Slot {
                group: SlotGroup::Iter,
                ..
            })
        )
    }

    fn refcell(&self, r: VarRefId) -> CompileResult<String> {
        let index = self.func.ref_slots.get(&r).copied().ok_or_else(|| {
            CompileError::internal(format!("{}: reference {} has no slot", self.func.name, r))
        })?;
        let prefix = if self.heap() { "fr->" } else { "" };
        Ok(format!("{}r[{}]", prefix, index))
    }
}

impl<'a> Emitter<'a> {
    pub(super) fn emit_function(&mut self, func: &'a FunctionIr) -> CompileResult<()> {
        let locals = Locals { func };
        let symbol = function_symbol(func);

        if func.heap_frame {
            self.w(format_args!("struct {}_frame {{", symbol));
            if func.slot_counts.refs > 0 {
                self.w(format_args!("    qu_ref *r[{}];", func.slot_counts.refs));
            }
            if func.slot_counts.values > 0 {
                self.w(format_args!("    qu_value v[{}];", func.slot_counts.values));
            }
            if func.slot_counts.iters > 0 {
                self.w(format_args!("    qu_iter it[{}];", func.slot_counts.iters));
            }
            if func.is_generator {
                self.w(format_args!("    unsigned resume;"));
            }
            self.w(format_args!("}};"));
        }

        self.w(format_args!("/* {} */", func.name));
        self.w(format_args!(
            "static qu_value {}({}) {{",
            symbol,
            param_list(func.kind)
        ));

        if func.heap_frame {
            let alloc = if func.is_generator {
                "qu_gen_frame"
            } else {
                "qu_frame_push"
            };
            self.w(format_args!(
                "    struct {sym}_frame *fr = (struct {sym}_frame *){alloc}(ctx, sizeof(struct {sym}_frame));",
                sym = symbol,
                alloc = alloc,
            ));
        } else {
            if func.slot_counts.refs > 0 {
                self.w(format_args!("    qu_ref *r[{}];", func.slot_counts.refs));
            }
            if func.slot_counts.values > 0 {
                self.w(format_args!("    qu_value v[{}];", func.slot_counts.values));
            }
            if func.slot_counts.iters > 0 {
                self.w(format_args!("    qu_iter it[{}];", func.slot_counts.iters));
            }
        }

        // Closure prologue: capture stand-ins borrow the creator's cells.
        for (position, capture) in func.captures.iter().enumerate() {
            let cell = locals.refcell(capture.inner)?;
            self.w(format_args!(
                "    {} = qu_closure_capture(ctx, {});",
                cell, position
            ));
        }

        for (index, instr) in func.instrs.iter().enumerate() {
            self.emit_instr(func, &locals, index, instr)?;
        }

        self.w(format_args!("}}"));
        self.w(format_args!(""));
        Ok(())
    }

    fn check(&mut self, target: JumpTarget) {
        self.w(format_args!("    if (qu_failed(ctx)) goto {};", target));
    }

    fn teardown(&mut self, func: &FunctionIr) {
        if func.heap_frame && !func.is_generator {
            self.w(format_args!("    qu_frame_pop(ctx);"));
        }
    }

    fn retain_helper(&self) -> &'static str {
        if self.options.plain_ref_helpers {
            "qu_retain"
        } else {
            "QU_RETAIN"
        }
    }

    fn release_helper(&self) -> &'static str {
        if self.options.plain_ref_helpers {
            "qu_release"
        } else {
            "QU_RELEASE"
        }
    }

    fn emit_args(
        &mut self,
        locals: &Locals<'_>,
        index: usize,
        args: &CallArgs,
    ) -> CompileResult<(String, String)> {
        match args {
            CallArgs::List(list) if list.is_empty() => {
                Ok(("0".to_string(), "NULL".to_string()))
            }
            CallArgs::List(list) => {
                let name = format!("a{}", index);
                let rendered: Vec<String> = list
                    .iter()
                    .map(|&v| locals.val(v))
                    .collect::<CompileResult<_>>()?;
                self.w(format_args!(
                    "    qu_value {}[{}] = {{ {} }};",
                    name,
                    list.len(),
                    rendered.join(", ")
                ));
                Ok((list.len().to_string(), name))
            }
            CallArgs::Spread(_) | CallArgs::Forward => Ok(("argc".to_string(), "argv".to_string())),
        }
    }

    fn emit_instr(
        &mut self,
        func: &FunctionIr,
        locals: &Locals<'_>,
        index: usize,
        instr: &Instr,
    ) -> CompileResult<()> {
        match instr {
            Instr::LoadConst { dest, value } => {
                let d = locals.val(*dest)?;
                let rendered = match value {
                    Constant::Undefined => "qu_undefined()".to_string(),
                    Constant::Null => "qu_null()".to_string(),
                    Constant::Bool(b) => format!("qu_bool({})", u8::from(*b)),
                    Constant::Number(n) => format!("qu_number({})", c_number(*n)),
                    Constant::Str(s) => format!("qu_string_consts[{}]", s.0),
                };
                self.w(format_args!("    {} = {};", d, rendered));
            }
            Instr::Copy { dest, src } => {
                self.w(format_args!(
                    "    {} = {};",
                    locals.val(*dest)?,
                    locals.val(*src)?
                ));
            }
            Instr::LoadArg { dest, index } => {
                self.w(format_args!(
                    "    {} = qu_arg(argc, argv, {});",
                    locals.val(*dest)?,
                    index
                ));
            }
            Instr::LoadThis { dest } => {
                self.w(format_args!("    {} = self;", locals.val(*dest)?));
            }
            Instr::LoadNewTarget { dest } => {
                // Constructors carry the target as a parameter; everywhere
                // else it comes from the context.
                if func.kind.has_new_target() {
                    self.w(format_args!("    {} = new_target;", locals.val(*dest)?));
                } else {
                    self.w(format_args!(
                        "    {} = qu_new_target(ctx);",
                        locals.val(*dest)?
                    ));
                }
            }

            Instr::DeclareRef { var } => {
                self.w(format_args!(
                    "    {} = qu_ref_new(ctx);",
                    locals.refcell(*var)?
                ));
            }
            Instr::LoadRef { dest, var } => {
                self.w(format_args!(
                    "    {} = qu_ref_get({});",
                    locals.val(*dest)?,
                    locals.refcell(*var)?
                ));
            }
            Instr::StoreRef { var, value } => {
                self.w(format_args!(
                    "    qu_ref_set(ctx, {}, {});",
                    locals.refcell(*var)?,
                    locals.val(*value)?
                ));
            }

            Instr::GetProperty {
                dest,
                object,
                name,
                cache,
                on_error,
            } => {
                let helper = self.property_helper("qu_get_prop", *object);
                let atom = self.atom_sym(*name).to_string();
                let cache_arg = match cache {
                    Some(slot) if self.options.inline_property_cache => {
                        format!("&qu_prop_cache[{}]", slot)
                    }
                    _ => "NULL".to_string(),
                };
                self.w(format_args!(
                    "    {} = {}(ctx, {}, {}, {});",
                    locals.val(*dest)?,
                    helper,
                    locals.val(*object)?,
                    atom,
                    cache_arg
                ));
                self.check(*on_error);
            }
            Instr::SetProperty {
                object,
                name,
                value,
                on_error,
            } => {
                let helper = self.property_helper("qu_set_prop", *object);
                let atom = self.atom_sym(*name).to_string();
                self.w(format_args!(
                    "    {}(ctx, {}, {}, {});",
                    helper,
                    locals.val(*object)?,
                    atom,
                    locals.val(*value)?
                ));
                self.check(*on_error);
            }
            Instr::DeleteProperty {
                dest,
                object,
                name,
                on_error,
            } => {
                let atom = self.atom_sym(*name).to_string();
                self.w(format_args!(
                    "    {} = qu_del_prop(ctx, {}, {});",
                    locals.val(*dest)?,
                    locals.val(*object)?,
                    atom
                ));
                self.check(*on_error);
            }
            Instr::DeleteElement {
                dest,
                object,
                key,
                on_error,
            } => {
                self.w(format_args!(
                    "    {} = qu_del_elem(ctx, {}, {});",
                    locals.val(*dest)?,
                    locals.val(*object)?,
                    locals.val(*key)?
                ));
                self.check(*on_error);
            }
            Instr::GetElement {
                dest,
                object,
                key,
                on_error,
            } => {
                self.w(format_args!(
                    "    {} = qu_get_elem(ctx, {}, {});",
                    locals.val(*dest)?,
                    locals.val(*object)?,
                    locals.val(*key)?
                ));
                self.check(*on_error);
            }
            Instr::SetElement {
                object,
                key,
                value,
                on_error,
            } => {
                self.w(format_args!(
                    "    qu_set_elem(ctx, {}, {}, {});",
                    locals.val(*object)?,
                    locals.val(*key)?,
                    locals.val(*value)?
                ));
                self.check(*on_error);
            }

            Instr::Unary {
                dest,
                op,
                operand,
                on_error,
            } => {
                let d = locals.val(*dest)?;
                let o = locals.val(*operand)?;
                let rendered = match op {
                    UnaryOp::Neg => format!("qu_neg(ctx, {})", o),
                    UnaryOp::Not => format!("qu_not({})", o),
                    UnaryOp::BitNot => format!("qu_bitnot(ctx, {})", o),
                    UnaryOp::TypeOf => format!("qu_typeof(ctx, {})", o),
                    UnaryOp::Void => "qu_undefined()".to_string(),
                };
                self.w(format_args!("    {} = {};", d, rendered));
                if let Some(target) = on_error {
                    self.check(*target);
                }
            }
            Instr::Binary {
                dest,
                op,
                left,
                right,
                on_error,
            } => {
                self.w(format_args!(
                    "    {} = {}(ctx, {}, {});",
                    locals.val(*dest)?,
                    binary_helper(*op),
                    locals.val(*left)?,
                    locals.val(*right)?
                ));
                if let Some(target) = on_error {
                    self.check(*target);
                }
            }

            Instr::Call {
                dest,
                callee,
                receiver,
                args,
                on_error,
            } => {
                let recv = match receiver {
                    Some(r) => locals.val(*r)?,
                    None => "qu_undefined()".to_string(),
                };
                match args {
                    CallArgs::Spread(array) => {
                        self.w(format_args!(
                            "    {} = qu_call_spread(ctx, {}, {}, {});",
                            locals.val(*dest)?,
                            locals.val(*callee)?,
                            recv,
                            locals.val(*array)?
                        ));
                    }
                    _ => {
                        let (count, vector) = self.emit_args(locals, index, args)?;
                        self.w(format_args!(
                            "    {} = qu_call(ctx, {}, {}, {}, {});",
                            locals.val(*dest)?,
                            locals.val(*callee)?,
                            recv,
                            count,
                            vector
                        ));
                    }
                }
                self.check(*on_error);
            }
            Instr::Construct {
                dest,
                callee,
                args,
                on_error,
            } => {
                match args {
                    CallArgs::Spread(array) => {
                        self.w(format_args!(
                            "    {} = qu_construct_spread(ctx, {}, {});",
                            locals.val(*dest)?,
                            locals.val(*callee)?,
                            locals.val(*array)?
                        ));
                    }
                    _ => {
                        let (count, vector) = self.emit_args(locals, index, args)?;
                        self.w(format_args!(
                            "    {} = qu_construct(ctx, {}, {}, {});",
                            locals.val(*dest)?,
                            locals.val(*callee)?,
                            count,
                            vector
                        ));
                    }
                }
                self.check(*on_error);
            }

            Instr::NewObject {
                dest,
                prototype,
                on_error,
            } => {
                let proto = match prototype {
                    Some(p) => locals.val(*p)?,
                    None => "qu_undefined()".to_string(),
                };
                self.w(format_args!(
                    "    {} = qu_new_object(ctx, {});",
                    locals.val(*dest)?,
                    proto
                ));
                self.check(*on_error);
            }
            Instr::NewFunction {
                dest,
                function,
                captures,
                on_error,
            } => {
                let caps = self.emit_captures(locals, index, captures)?;
                self.w(format_args!(
                    "    {} = qu_new_closure(ctx, qu_module_func(ctx, {}), {}, {});",
                    locals.val(*dest)?,
                    function.as_u32(),
                    captures.len(),
                    caps
                ));
                self.check(*on_error);
            }
            Instr::NewClass {
                dest,
                constructor,
                parent,
                captures,
                on_error,
            } => {
                let parent = match parent {
                    Some(p) => locals.val(*p)?,
                    None => "qu_undefined()".to_string(),
                };
                let caps = self.emit_captures(locals, index, captures)?;
                self.w(format_args!(
                    "    {} = qu_new_class(ctx, qu_module_func(ctx, {}), {}, {}, {});",
                    locals.val(*dest)?,
                    constructor.as_u32(),
                    parent,
                    captures.len(),
                    caps
                ));
                self.check(*on_error);
            }

            Instr::NewIterator {
                dest,
                object,
                keys,
                on_error,
            } => {
                if locals.iter_is_record(*dest) {
                    self.w(format_args!(
                        "    qu_iter_init(ctx, {}, {}, {});",
                        locals.iter_rec(*dest)?,
                        locals.val(*object)?,
                        u8::from(*keys)
                    ));
                } else {
                    self.w(format_args!(
                        "    {} = qu_iter_open(ctx, {}, {});",
                        locals.val(*dest)?,
                        locals.val(*object)?,
                        u8::from(*keys)
                    ));
                }
                self.check(*on_error);
            }
            Instr::IteratorNext {
                dest,
                iterator,
                exhausted,
                on_error,
            } => {
                if locals.iter_is_record(*iterator) {
                    let rec = locals.iter_rec(*iterator)?;
                    self.w(format_args!(
                        "    {} = qu_iter_next(ctx, {});",
                        locals.val(*dest)?,
                        rec
                    ));
                    self.check(*on_error);
                    self.w(format_args!(
                        "    if (qu_iter_done({})) goto {};",
                        rec, exhausted
                    ));
                } else {
                    self.w(format_args!(
                        "    {} = qu_iter_step(ctx, {});",
                        locals.val(*dest)?,
                        locals.val(*iterator)?
                    ));
                    self.check(*on_error);
                    self.w(format_args!(
                        "    if (qu_iter_exhausted(ctx)) goto {};",
                        exhausted
                    ));
                }
            }

            Instr::Label { target } => {
                self.w(format_args!("{}:;", target));
            }
            Instr::Jump { target } => {
                self.w(format_args!("    goto {};", target));
            }
            Instr::Branch {
                value,
                mode,
                expect,
                target,
            } => {
                let test = match mode {
                    BranchMode::Truthy => format!("qu_truthy({})", locals.val(*value)?),
                    BranchMode::NotNullish => format!("!qu_nullish({})", locals.val(*value)?),
                };
                let test = if *expect { test } else { format!("!({})", test) };
                self.w(format_args!("    if ({}) goto {};", test, target));
            }
            Instr::Return { value } => {
                match value {
                    Some(v) => {
                        let rendered = locals.val(*v)?;
                        if func.heap_frame && !func.is_generator {
                            self.w(format_args!(
                                "    {{ qu_value qret = {}; qu_frame_pop(ctx); return qret; }}",
                                rendered
                            ));
                        } else {
                            self.w(format_args!("    return {};", rendered));
                        }
                    }
                    None => {
                        self.teardown(func);
                        self.w(format_args!("    return qu_undefined();"));
                    }
                }
            }
            Instr::Propagate => {
                self.teardown(func);
                self.w(format_args!("    return qu_propagate(ctx);"));
            }

            Instr::Throw { value, on_error } => {
                self.w(format_args!(
                    "    qu_throw(ctx, {});",
                    locals.val(*value)?
                ));
                self.w(format_args!("    goto {};", on_error));
            }
            Instr::CatchException { dest } => {
                self.w(format_args!("    {} = qu_catch(ctx);", locals.val(*dest)?));
            }
            Instr::RaisePending { target } => {
                self.w(format_args!("    if (qu_pending(ctx)) goto {};", target));
            }

            Instr::Suspend {
                value,
                resume,
                yield_to,
            } => {
                let position = func
                    .resume_points
                    .iter()
                    .position(|t| t == resume)
                    .ok_or_else(|| {
                        CompileError::internal(format!(
                            "{}: suspend target {} not registered",
                            func.name, resume
                        ))
                    })?;
                let ret = func.ret_slot.ok_or_else(|| {
                    CompileError::internal(format!(
                        "{}: suspend outside a generator",
                        func.name
                    ))
                })?;
                self.w(format_args!("    fr->resume = {};", position + 1));
                self.w(format_args!(
                    "    {} = {};",
                    locals.val(ret)?,
                    locals.val(*value)?
                ));
                self.w(format_args!("    goto {};", yield_to));
            }
            Instr::ResumeDispatch { targets } => {
                if !targets.is_empty() {
                    self.w(format_args!("    switch (fr->resume) {{"));
                    for (position, target) in targets.iter().enumerate() {
                        self.w(format_args!("    case {}: goto {};", position + 1, target));
                    }
                    self.w(format_args!("    default: break;"));
                    self.w(format_args!("    }}"));
                }
            }
            Instr::ResumeValue { dest } => {
                self.w(format_args!(
                    "    {} = qu_gen_sent(ctx);",
                    locals.val(*dest)?
                ));
            }
            Instr::FinishGenerator => {
                self.w(format_args!("    fr->resume = QU_GEN_DONE;"));
            }

            Instr::Retain { dest, value } => {
                self.w(format_args!(
                    "    {} = {}({});",
                    locals.val(*dest)?,
                    self.retain_helper(),
                    locals.val(*value)?
                ));
            }
            Instr::Release { value } => {
                self.w(format_args!(
                    "    {}(ctx, {});",
                    self.release_helper(),
                    locals.val(*value)?
                ));
            }
            Instr::ReleaseMany { values } => {
                let rendered: Vec<String> = values
                    .iter()
                    .map(|&v| locals.val(v))
                    .collect::<CompileResult<_>>()?;
                self.w(format_args!(
                    "    {{ qu_value rel{}[{}] = {{ {} }}; qu_release_many(ctx, {}, rel{}); }}",
                    index,
                    values.len(),
                    rendered.join(", "),
                    values.len(),
                    index
                ));
            }
            Instr::AutoRelease { value } => {
                self.w(format_args!(
                    "    qu_autorelease(ctx, {});",
                    locals.val(*value)?
                ));
            }

            Instr::Stub { scope } => {
                return Err(CompileError::Verification {
                    message: format!("{}: unresolved stub for {}", func.name, scope),
                });
            }
        }
        Ok(())
    }

    fn emit_captures(
        &mut self,
        locals: &Locals<'_>,
        index: usize,
        captures: &[VarRefId],
    ) -> CompileResult<String> {
        if captures.is_empty() {
            return Ok("NULL".to_string());
        }
        let name = format!("caps{}", index);
        let cells: Vec<String> = captures
            .iter()
            .map(|&r| locals.refcell(r))
            .collect::<CompileResult<_>>()?;
        self.w(format_args!(
            "    qu_ref *{}[{}] = {{ {} }};",
            name,
            captures.len(),
            cells.join(", ")
        ));
        Ok(name)
    }

    /// Select the nullish-checking or fast property helper, depending on
    /// whether the object's type can be undefined or null.
    fn property_helper(&self, base: &'static str, object: ValueId) -> String {
        if self.options.null_check_optimization {
            let ty = self.module.values.ty(object);
            let nullish = ValueType::UNDEFINED.union(ValueType::NULL);
            if !ty.intersects(nullish) && !ty.is_empty() {
                return format!("{}_fast", base);
            }
        }
        base.to_string()
    }
}
