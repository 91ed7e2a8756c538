//! IR instructions
//!
//! One closed set of tagged variants; every consumer (resolver, transform
//! passes, emitter) matches exhaustively. Fallible variants carry the jump
//! target taken on failure, resolved when the instruction was constructed.

use super::ty::ValueType;
use super::value::{Atom, Constant, FunctionId, JumpTarget, ScopeId, ValueId, VarRefId};
use std::fmt;

/// Argument-passing mode for calls and constructions.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgs {
    /// Direct argument list.
    List(Vec<ValueId>),
    /// A single value holding an argument array, spread at the call.
    Spread(ValueId),
    /// Forward the current invocation's own argument vector unchanged.
    Forward,
}

/// Predicate used by conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchMode {
    /// Scripting-language truthiness.
    Truthy,
    /// Neither undefined nor null.
    NotNullish,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    TypeOf,
    Void,
}

impl UnaryOp {
    /// Result type given the operand type.
    pub fn result_type(&self, _operand: ValueType) -> ValueType {
        match self {
            UnaryOp::Neg | UnaryOp::BitNot => ValueType::NUMBER,
            UnaryOp::Not => ValueType::BOOL,
            UnaryOp::TypeOf => ValueType::OBJECT,
            UnaryOp::Void => ValueType::UNDEFINED,
        }
    }

    /// Whether the operation can fail for the given operand type.
    pub fn is_fallible(&self, operand: ValueType) -> bool {
        match self {
            // Coercion to number may invoke user code unless the operand is
            // already numeric.
            UnaryOp::Neg | UnaryOp::BitNot => !operand.is_number(),
            UnaryOp::Not | UnaryOp::TypeOf | UnaryOp::Void => false,
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::TypeOf => "typeof",
            UnaryOp::Void => "void",
        };
        write!(f, "{}", s)
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Ushr,
    InstanceOf,
    In,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::StrictEq
                | BinaryOp::Ne
                | BinaryOp::StrictNe
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
        )
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::Shl
                | BinaryOp::Shr
                | BinaryOp::Ushr
        )
    }

    /// Result type given both operand types.
    pub fn result_type(&self, left: ValueType, right: ValueType) -> ValueType {
        match self {
            BinaryOp::Add => {
                if left.is_number() && right.is_number() {
                    ValueType::NUMBER
                } else {
                    // Mixed addition can produce a heap string.
                    ValueType::OBJECT
                }
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => ValueType::NUMBER,
            op if op.is_comparison() => ValueType::BOOL,
            op if op.is_bitwise() => ValueType::NUMBER,
            BinaryOp::InstanceOf | BinaryOp::In => ValueType::BOOL,
            _ => unreachable!(),
        }
    }

    /// Whether the operation can fail for the given operand types.
    pub fn is_fallible(&self, left: ValueType, right: ValueType) -> bool {
        let plain = ValueType::NUMBER.union(ValueType::BOOL);
        match self {
            BinaryOp::InstanceOf | BinaryOp::In => true,
            op if op.is_comparison() => {
                let cmp_plain = plain.union(ValueType::UNDEFINED).union(ValueType::NULL);
                !(cmp_plain.contains(left) && cmp_plain.contains(right))
                    || left.is_empty()
                    || right.is_empty()
            }
            // Arithmetic and bitwise coerce; user code may run unless both
            // sides are already plain.
            _ => {
                !(plain.contains(left) && plain.contains(right))
                    || left.is_empty()
                    || right.is_empty()
            }
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::StrictEq => "===",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
            BinaryOp::InstanceOf => "instanceof",
            BinaryOp::In => "in",
        };
        write!(f, "{}", s)
    }
}

/// How a reference instruction uses its variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefUse {
    Declare,
    Load,
    Store,
}

/// One IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    // Constants and moves
    LoadConst { dest: ValueId, value: Constant },
    Copy { dest: ValueId, src: ValueId },
    /// Read one invocation argument by position.
    LoadArg { dest: ValueId, index: u32 },
    /// Materialize the receiver parameter.
    LoadThis { dest: ValueId },
    /// Materialize the new-target parameter (constructor shape only).
    LoadNewTarget { dest: ValueId },

    // Variable references
    DeclareRef { var: VarRefId },
    LoadRef { dest: ValueId, var: VarRefId },
    StoreRef { var: VarRefId, value: ValueId },

    // Property access
    GetProperty {
        dest: ValueId,
        object: ValueId,
        name: Atom,
        /// Inline-cache slot, assigned module-wide by the cache allocator.
        cache: Option<u32>,
        on_error: JumpTarget,
    },
    SetProperty {
        object: ValueId,
        name: Atom,
        value: ValueId,
        on_error: JumpTarget,
    },
    DeleteProperty {
        dest: ValueId,
        object: ValueId,
        name: Atom,
        on_error: JumpTarget,
    },
    GetElement {
        dest: ValueId,
        object: ValueId,
        key: ValueId,
        on_error: JumpTarget,
    },
    SetElement {
        object: ValueId,
        key: ValueId,
        value: ValueId,
        on_error: JumpTarget,
    },
    DeleteElement {
        dest: ValueId,
        object: ValueId,
        key: ValueId,
        on_error: JumpTarget,
    },

    // Operators
    Unary {
        dest: ValueId,
        op: UnaryOp,
        operand: ValueId,
        on_error: Option<JumpTarget>,
    },
    Binary {
        dest: ValueId,
        op: BinaryOp,
        left: ValueId,
        right: ValueId,
        on_error: Option<JumpTarget>,
    },

    // Invocation
    Call {
        dest: ValueId,
        callee: ValueId,
        receiver: Option<ValueId>,
        args: CallArgs,
        on_error: JumpTarget,
    },
    Construct {
        dest: ValueId,
        callee: ValueId,
        args: CallArgs,
        on_error: JumpTarget,
    },

    // Construction
    NewObject {
        dest: ValueId,
        prototype: Option<ValueId>,
        on_error: JumpTarget,
    },
    NewFunction {
        dest: ValueId,
        function: FunctionId,
        captures: Vec<VarRefId>,
        on_error: JumpTarget,
    },
    NewClass {
        dest: ValueId,
        constructor: FunctionId,
        parent: Option<ValueId>,
        captures: Vec<VarRefId>,
        on_error: JumpTarget,
    },

    // Iteration
    NewIterator {
        dest: ValueId,
        object: ValueId,
        /// Keys iterator (enumerate property names) vs value iterator.
        keys: bool,
        on_error: JumpTarget,
    },
    IteratorNext {
        dest: ValueId,
        iterator: ValueId,
        exhausted: JumpTarget,
        on_error: JumpTarget,
    },

    // Control flow
    Label { target: JumpTarget },
    Jump { target: JumpTarget },
    Branch {
        value: ValueId,
        mode: BranchMode,
        /// Jump when the predicate evaluates to this.
        expect: bool,
        target: JumpTarget,
    },
    Return { value: Option<ValueId> },
    /// Return the failure marker, propagating the pending exception.
    Propagate,

    // Exceptions
    Throw { value: ValueId, on_error: JumpTarget },
    /// Catch entry: move the pending exception into `dest` and clear it.
    CatchException { dest: ValueId },
    /// Finally exit: if an exception is still pending, jump to `target`.
    RaisePending { target: JumpTarget },

    // Generators
    Suspend {
        value: ValueId,
        /// Resume point persisted into per-instance state.
        resume: JumpTarget,
        /// The function's yield target; control returns to the caller.
        yield_to: JumpTarget,
    },
    /// Re-entry dispatch prefixed to a generator body: multi-way jump keyed
    /// by the persisted resume point.
    ResumeDispatch { targets: Vec<JumpTarget> },
    /// Read the value sent into the generator on resume.
    ResumeValue { dest: ValueId },
    /// Mark the generator complete before the final return.
    FinishGenerator,

    // Memory management (pipeline-inserted)
    Retain { dest: ValueId, value: ValueId },
    Release { value: ValueId },
    ReleaseMany { values: Vec<ValueId> },
    AutoRelease { value: ValueId },

    /// Placeholder occupying a child scope's position in its parent buffer;
    /// expanded by the stub resolver.
    Stub { scope: ScopeId },
}

impl Instr {
    /// The value this instruction produces, if any.
    pub fn result(&self) -> Option<ValueId> {
        match self {
            Instr::LoadConst { dest, .. }
            | Instr::Copy { dest, .. }
            | Instr::LoadArg { dest, .. }
            | Instr::LoadThis { dest }
            | Instr::LoadNewTarget { dest }
            | Instr::LoadRef { dest, .. }
            | Instr::GetProperty { dest, .. }
            | Instr::DeleteProperty { dest, .. }
            | Instr::GetElement { dest, .. }
            | Instr::DeleteElement { dest, .. }
            | Instr::Unary { dest, .. }
            | Instr::Binary { dest, .. }
            | Instr::Call { dest, .. }
            | Instr::Construct { dest, .. }
            | Instr::NewObject { dest, .. }
            | Instr::NewFunction { dest, .. }
            | Instr::NewClass { dest, .. }
            | Instr::NewIterator { dest, .. }
            | Instr::IteratorNext { dest, .. }
            | Instr::CatchException { dest }
            | Instr::ResumeValue { dest }
            | Instr::Retain { dest, .. } => Some(*dest),
            _ => None,
        }
    }

    /// Visit every value this instruction reads.
    pub fn for_each_read(&self, mut f: impl FnMut(ValueId)) {
        let visit_args = |args: &CallArgs, f: &mut dyn FnMut(ValueId)| match args {
            CallArgs::List(list) => list.iter().for_each(|&v| f(v)),
            CallArgs::Spread(v) => f(*v),
            CallArgs::Forward => {}
        };
        match self {
            Instr::Copy { src, .. } => f(*src),
            Instr::StoreRef { value, .. } => f(*value),
            Instr::GetProperty { object, .. } | Instr::DeleteProperty { object, .. } => f(*object),
            Instr::SetProperty { object, value, .. } => {
                f(*object);
                f(*value);
            }
            Instr::GetElement { object, key, .. } | Instr::DeleteElement { object, key, .. } => {
                f(*object);
                f(*key);
            }
            Instr::SetElement { object, key, value, .. } => {
                f(*object);
                f(*key);
                f(*value);
            }
            Instr::Unary { operand, .. } => f(*operand),
            Instr::Binary { left, right, .. } => {
                f(*left);
                f(*right);
            }
            Instr::Call { callee, receiver, args, .. } => {
                f(*callee);
                if let Some(r) = receiver {
                    f(*r);
                }
                visit_args(args, &mut f);
            }
            Instr::Construct { callee, args, .. } => {
                f(*callee);
                visit_args(args, &mut f);
            }
            Instr::NewObject { prototype, .. } => {
                if let Some(p) = prototype {
                    f(*p);
                }
            }
            Instr::NewClass { parent, .. } => {
                if let Some(p) = parent {
                    f(*p);
                }
            }
            Instr::NewIterator { object, .. } => f(*object),
            Instr::IteratorNext { iterator, .. } => f(*iterator),
            Instr::Branch { value, .. } => f(*value),
            Instr::Return { value: Some(v) } => f(*v),
            Instr::Throw { value, .. } => f(*value),
            Instr::Suspend { value, .. } => f(*value),
            Instr::Retain { value, .. } => f(*value),
            Instr::Release { value } | Instr::AutoRelease { value } => f(*value),
            Instr::ReleaseMany { values } => values.iter().for_each(|&v| f(v)),
            _ => {}
        }
    }

    /// Rewrite every read of `from` into a read of `to`.
    pub fn replace_read(&mut self, from: ValueId, to: ValueId) {
        let sub = |v: &mut ValueId| {
            if *v == from {
                *v = to;
            }
        };
        let sub_args = |args: &mut CallArgs| match args {
            CallArgs::List(list) => list.iter_mut().for_each(|v| {
                if *v == from {
                    *v = to;
                }
            }),
            CallArgs::Spread(v) => {
                if *v == from {
                    *v = to;
                }
            }
            CallArgs::Forward => {}
        };
        match self {
            Instr::Copy { src, .. } => sub(src),
            Instr::StoreRef { value, .. } => sub(value),
            Instr::GetProperty { object, .. } | Instr::DeleteProperty { object, .. } => sub(object),
            Instr::SetProperty { object, value, .. } => {
                sub(object);
                sub(value);
            }
            Instr::GetElement { object, key, .. } | Instr::DeleteElement { object, key, .. } => {
                sub(object);
                sub(key);
            }
            Instr::SetElement { object, key, value, .. } => {
                sub(object);
                sub(key);
                sub(value);
            }
            Instr::Unary { operand, .. } => sub(operand),
            Instr::Binary { left, right, .. } => {
                sub(left);
                sub(right);
            }
            Instr::Call { callee, receiver, args, .. } => {
                sub(callee);
                if let Some(r) = receiver {
                    sub(r);
                }
                sub_args(args);
            }
            Instr::Construct { callee, args, .. } => {
                sub(callee);
                sub_args(args);
            }
            Instr::NewObject { prototype, .. } => {
                if let Some(p) = prototype {
                    sub(p);
                }
            }
            Instr::NewClass { parent, .. } => {
                if let Some(p) = parent {
                    sub(p);
                }
            }
            Instr::NewIterator { object, .. } => sub(object),
            Instr::IteratorNext { iterator, .. } => sub(iterator),
            Instr::Branch { value, .. } => sub(value),
            Instr::Return { value: Some(v) } => sub(v),
            Instr::Throw { value, .. } => sub(value),
            Instr::Suspend { value, .. } => sub(value),
            Instr::Retain { value, .. } => sub(value),
            Instr::Release { value } | Instr::AutoRelease { value } => sub(value),
            Instr::ReleaseMany { values } => values.iter_mut().for_each(|v| {
                if *v == from {
                    *v = to;
                }
            }),
            _ => {}
        }
    }

    /// The exception target taken when this instruction fails, if fallible.
    pub fn error_target(&self) -> Option<JumpTarget> {
        match self {
            Instr::GetProperty { on_error, .. }
            | Instr::SetProperty { on_error, .. }
            | Instr::DeleteProperty { on_error, .. }
            | Instr::GetElement { on_error, .. }
            | Instr::SetElement { on_error, .. }
            | Instr::DeleteElement { on_error, .. }
            | Instr::Call { on_error, .. }
            | Instr::Construct { on_error, .. }
            | Instr::NewObject { on_error, .. }
            | Instr::NewFunction { on_error, .. }
            | Instr::NewClass { on_error, .. }
            | Instr::NewIterator { on_error, .. }
            | Instr::IteratorNext { on_error, .. }
            | Instr::Throw { on_error, .. } => Some(*on_error),
            Instr::Unary { on_error, .. } | Instr::Binary { on_error, .. } => *on_error,
            _ => None,
        }
    }

    /// The label this instruction defines, if it is a label.
    pub fn defined_label(&self) -> Option<JumpTarget> {
        match self {
            Instr::Label { target } => Some(*target),
            _ => None,
        }
    }

    /// Visit every jump target this instruction may transfer control to.
    pub fn for_each_target(&self, mut f: impl FnMut(JumpTarget)) {
        if let Some(t) = self.error_target() {
            f(t);
        }
        match self {
            Instr::Jump { target } | Instr::Branch { target, .. } | Instr::RaisePending { target } => {
                f(*target)
            }
            Instr::IteratorNext { exhausted, .. } => f(*exhausted),
            Instr::Suspend { resume, yield_to, .. } => {
                f(*resume);
                f(*yield_to);
            }
            Instr::ResumeDispatch { targets } => targets.iter().for_each(|&t| f(t)),
            _ => {}
        }
    }

    /// Variable-reference use, if this is a reference instruction.
    pub fn ref_use(&self) -> Option<(VarRefId, RefUse)> {
        match self {
            Instr::DeclareRef { var } => Some((*var, RefUse::Declare)),
            Instr::LoadRef { var, .. } => Some((*var, RefUse::Load)),
            Instr::StoreRef { var, .. } => Some((*var, RefUse::Store)),
            _ => None,
        }
    }

    /// Whether control never falls through past this instruction.
    pub fn ends_flow(&self) -> bool {
        matches!(
            self,
            Instr::Jump { .. } | Instr::Return { .. } | Instr::Propagate | Instr::Throw { .. }
        )
    }

    /// Whether the instruction has effects beyond its own result.
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Instr::StoreRef { .. }
                | Instr::DeclareRef { .. }
                | Instr::SetProperty { .. }
                | Instr::SetElement { .. }
                | Instr::DeleteProperty { .. }
                | Instr::DeleteElement { .. }
                | Instr::Call { .. }
                | Instr::Construct { .. }
                | Instr::NewObject { .. }
                | Instr::NewFunction { .. }
                | Instr::NewClass { .. }
                | Instr::NewIterator { .. }
                | Instr::IteratorNext { .. }
                | Instr::Throw { .. }
                | Instr::CatchException { .. }
                | Instr::Suspend { .. }
                | Instr::ResumeDispatch { .. }
                | Instr::ResumeValue { .. }
                | Instr::FinishGenerator
                | Instr::Retain { .. }
                | Instr::Release { .. }
                | Instr::ReleaseMany { .. }
                | Instr::AutoRelease { .. }
                | Instr::Stub { .. }
        )
    }

    /// Whether the instruction could run arbitrary user code.
    pub fn is_call_like(&self) -> bool {
        matches!(
            self,
            Instr::Call { .. }
                | Instr::Construct { .. }
                | Instr::GetProperty { .. }
                | Instr::SetProperty { .. }
                | Instr::GetElement { .. }
                | Instr::SetElement { .. }
                | Instr::DeleteProperty { .. }
                | Instr::DeleteElement { .. }
                | Instr::IteratorNext { .. }
                | Instr::NewIterator { .. }
        )
    }
}
