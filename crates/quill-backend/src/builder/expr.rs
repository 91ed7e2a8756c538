//! Expression emission
//!
//! Constants, moves, property and element access, operators, invocation, and
//! object construction. Every fallible instruction is routed to the active
//! exception target at construction time, so the transform passes and the
//! emitter never re-derive routing.

use super::ModuleBuilder;
use crate::error::{CompileError, CompileResult};
use crate::ir::{
    BinaryOp, CallArgs, Constant, FunctionId, Instr, JumpTarget, ScopeId, UnaryOp, ValueId,
    ValueType,
};

impl ModuleBuilder {
    fn emit_const(&mut self, scope: ScopeId, value: Constant) -> CompileResult<ValueId> {
        let function = self.scope(scope)?.function;
        let dest = self.values.alloc(function, value.value_type());
        self.functions[function.0 as usize]
            .const_values
            .insert(dest, value);
        self.push(scope, Instr::LoadConst { dest, value })?;
        Ok(dest)
    }

    pub fn const_undefined(&mut self, scope: ScopeId) -> CompileResult<ValueId> {
        self.emit_const(scope, Constant::Undefined)
    }

    pub fn const_null(&mut self, scope: ScopeId) -> CompileResult<ValueId> {
        self.emit_const(scope, Constant::Null)
    }

    pub fn const_bool(&mut self, scope: ScopeId, value: bool) -> CompileResult<ValueId> {
        self.emit_const(scope, Constant::Bool(value))
    }

    pub fn const_number(&mut self, scope: ScopeId, value: f64) -> CompileResult<ValueId> {
        self.emit_const(scope, Constant::Number(value))
    }

    pub fn const_str(&mut self, scope: ScopeId, text: &str) -> CompileResult<ValueId> {
        let id = self.strings.intern(text);
        self.emit_const(scope, Constant::Str(id))
    }

    /// Copy a value into a fresh identifier of the same type.
    pub fn copy(&mut self, scope: ScopeId, src: ValueId) -> CompileResult<ValueId> {
        self.check_value(scope, src)?;
        let function = self.scope(scope)?.function;
        let dest = self.values.alloc(function, self.values.ty(src));
        if let Some(c) = self.functions[function.0 as usize].const_values.get(&src).copied() {
            self.functions[function.0 as usize].const_values.insert(dest, c);
        }
        self.push(scope, Instr::Copy { dest, src })?;
        Ok(dest)
    }

    // ---- property and element access ------------------------------------

    pub fn get_property(
        &mut self,
        scope: ScopeId,
        object: ValueId,
        name: &str,
    ) -> CompileResult<ValueId> {
        self.check_value(scope, object)?;
        let function = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let name = self.atoms.intern(name);
        let dest = self.values.alloc(function, ValueType::OBJECT);
        self.push(
            scope,
            Instr::GetProperty {
                dest,
                object,
                name,
                cache: None,
                on_error,
            },
        )?;
        Ok(dest)
    }

    pub fn set_property(
        &mut self,
        scope: ScopeId,
        object: ValueId,
        name: &str,
        value: ValueId,
    ) -> CompileResult<()> {
        self.check_value(scope, object)?;
        self.check_value(scope, value)?;
        let on_error = self.exception_target(scope)?;
        let name = self.atoms.intern(name);
        self.push(
            scope,
            Instr::SetProperty {
                object,
                name,
                value,
                on_error,
            },
        )
    }

    pub fn delete_property(
        &mut self,
        scope: ScopeId,
        object: ValueId,
        name: &str,
    ) -> CompileResult<ValueId> {
        self.check_value(scope, object)?;
        let function = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let name = self.atoms.intern(name);
        let dest = self.values.alloc(function, ValueType::BOOL);
        self.push(
            scope,
            Instr::DeleteProperty {
                dest,
                object,
                name,
                on_error,
            },
        )?;
        Ok(dest)
    }

    pub fn delete_element(
        &mut self,
        scope: ScopeId,
        object: ValueId,
        key: ValueId,
    ) -> CompileResult<ValueId> {
        self.check_value(scope, object)?;
        self.check_value(scope, key)?;
        let function = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let dest = self.values.alloc(function, ValueType::BOOL);
        self.push(
            scope,
            Instr::DeleteElement {
                dest,
                object,
                key,
                on_error,
            },
        )?;
        Ok(dest)
    }

    pub fn get_element(
        &mut self,
        scope: ScopeId,
        object: ValueId,
        key: ValueId,
    ) -> CompileResult<ValueId> {
        self.check_value(scope, object)?;
        self.check_value(scope, key)?;
        let function = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let dest = self.values.alloc(function, ValueType::OBJECT);
        self.push(
            scope,
            Instr::GetElement {
                dest,
                object,
                key,
                on_error,
            },
        )?;
        Ok(dest)
    }

    pub fn set_element(
        &mut self,
        scope: ScopeId,
        object: ValueId,
        key: ValueId,
        value: ValueId,
    ) -> CompileResult<()> {
        self.check_value(scope, object)?;
        self.check_value(scope, key)?;
        self.check_value(scope, value)?;
        let on_error = self.exception_target(scope)?;
        self.push(
            scope,
            Instr::SetElement {
                object,
                key,
                value,
                on_error,
            },
        )
    }

    // ---- operators ------------------------------------------------------

    pub fn unary(&mut self, scope: ScopeId, op: UnaryOp, operand: ValueId) -> CompileResult<ValueId> {
        self.check_value(scope, operand)?;
        let function = self.scope(scope)?.function;
        let operand_ty = self.values.ty(operand);
        let on_error = if op.is_fallible(operand_ty) {
            Some(self.exception_target(scope)?)
        } else {
            None
        };
        let dest = self.values.alloc(function, op.result_type(operand_ty));
        self.push(
            scope,
            Instr::Unary {
                dest,
                op,
                operand,
                on_error,
            },
        )?;
        Ok(dest)
    }

    pub fn binary(
        &mut self,
        scope: ScopeId,
        op: BinaryOp,
        left: ValueId,
        right: ValueId,
    ) -> CompileResult<ValueId> {
        self.check_value(scope, left)?;
        self.check_value(scope, right)?;
        let function = self.scope(scope)?.function;
        let left_ty = self.values.ty(left);
        let right_ty = self.values.ty(right);
        let on_error = if op.is_fallible(left_ty, right_ty) {
            Some(self.exception_target(scope)?)
        } else {
            None
        };
        let dest = self.values.alloc(function, op.result_type(left_ty, right_ty));
        self.push(
            scope,
            Instr::Binary {
                dest,
                op,
                left,
                right,
                on_error,
            },
        )?;
        Ok(dest)
    }

    // ---- invocation -----------------------------------------------------

    pub fn call(
        &mut self,
        scope: ScopeId,
        callee: ValueId,
        receiver: Option<ValueId>,
        args: CallArgs,
    ) -> CompileResult<ValueId> {
        self.check_value(scope, callee)?;
        if let Some(r) = receiver {
            self.check_value(scope, r)?;
        }
        self.check_args(scope, &args)?;
        let function = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let dest = self.values.alloc(function, ValueType::OBJECT);
        self.push(
            scope,
            Instr::Call {
                dest,
                callee,
                receiver,
                args,
                on_error,
            },
        )?;
        Ok(dest)
    }

    pub fn construct(
        &mut self,
        scope: ScopeId,
        callee: ValueId,
        args: CallArgs,
    ) -> CompileResult<ValueId> {
        self.check_value(scope, callee)?;
        self.check_args(scope, &args)?;
        let function = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let dest = self.values.alloc(function, ValueType::OBJECT);
        self.push(
            scope,
            Instr::Construct {
                dest,
                callee,
                args,
                on_error,
            },
        )?;
        Ok(dest)
    }

    fn check_args(&self, scope: ScopeId, args: &CallArgs) -> CompileResult<()> {
        match args {
            CallArgs::List(list) => {
                for &v in list {
                    self.check_value(scope, v)?;
                }
            }
            CallArgs::Spread(v) => self.check_value(scope, *v)?,
            CallArgs::Forward => {}
        }
        Ok(())
    }

    // ---- construction ---------------------------------------------------

    pub fn new_object(&mut self, scope: ScopeId, prototype: Option<ValueId>) -> CompileResult<ValueId> {
        if let Some(p) = prototype {
            self.check_value(scope, p)?;
        }
        let function = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let dest = self.values.alloc(function, ValueType::OBJECT);
        self.push(
            scope,
            Instr::NewObject {
                dest,
                prototype,
                on_error,
            },
        )?;
        Ok(dest)
    }

    /// Create a closure object over a finalized function. The capture list
    /// is the target's, in closure-argument order.
    pub fn new_function(&mut self, scope: ScopeId, function: FunctionId) -> CompileResult<ValueId> {
        let captures = self.closure_captures(function)?;
        let host = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let dest = self.values.alloc(host, ValueType::OBJECT);
        self.push(
            scope,
            Instr::NewFunction {
                dest,
                function,
                captures,
                on_error,
            },
        )?;
        Ok(dest)
    }

    /// Create a class object with a finalized constructor function and an
    /// optional parent class to inherit from.
    pub fn new_class(
        &mut self,
        scope: ScopeId,
        constructor: FunctionId,
        parent: Option<ValueId>,
    ) -> CompileResult<ValueId> {
        if let Some(p) = parent {
            self.check_value(scope, p)?;
        }
        let captures = self.closure_captures(constructor)?;
        let host = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let dest = self.values.alloc(host, ValueType::OBJECT);
        self.push(
            scope,
            Instr::NewClass {
                dest,
                constructor,
                parent,
                captures,
                on_error,
            },
        )?;
        Ok(dest)
    }

    fn closure_captures(&self, function: FunctionId) -> CompileResult<Vec<crate::ir::VarRefId>> {
        let state = self.function_state(function)?;
        // The capture list is complete only once the function is closed.
        if !state.closed {
            return Err(CompileError::UnclosedFunction {
                name: state.name.clone(),
            });
        }
        Ok(state.captures.iter().map(|c| c.outer).collect())
    }

    // ---- iteration ------------------------------------------------------

    pub fn new_iterator(
        &mut self,
        scope: ScopeId,
        object: ValueId,
        keys: bool,
    ) -> CompileResult<ValueId> {
        self.check_value(scope, object)?;
        let function = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let dest = self.values.alloc(function, ValueType::ITERATOR);
        self.push(
            scope,
            Instr::NewIterator {
                dest,
                object,
                keys,
                on_error,
            },
        )?;
        Ok(dest)
    }

    /// Advance an iterator; control transfers to `exhausted` when no item
    /// remains.
    pub fn iterator_next(
        &mut self,
        scope: ScopeId,
        iterator: ValueId,
        exhausted: JumpTarget,
    ) -> CompileResult<ValueId> {
        self.check_value(scope, iterator)?;
        let function = self.scope(scope)?.function;
        let on_error = self.exception_target(scope)?;
        let dest = self.values.alloc(function, ValueType::OBJECT);
        self.push(
            scope,
            Instr::IteratorNext {
                dest,
                iterator,
                exhausted,
                on_error,
            },
        )?;
        Ok(dest)
    }
}
