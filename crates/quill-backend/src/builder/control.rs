//! Control-flow emission
//!
//! Labels, jumps, branches, returns, throws, the try construct, and
//! generator suspension. The try construct is the only place exception
//! routing changes shape: its three arms are sub-scopes with overridden
//! exception targets, and re-raising out of a finally arm is explicit.

use super::ModuleBuilder;
use crate::error::{CompileError, CompileResult};
use crate::ir::{BranchMode, Instr, JumpTarget, ScopeId, ValueId, ValueType};

/// An in-progress try construct. The front end fills the arms between
/// `begin_try` and `end_try`.
#[derive(Debug)]
pub struct TryBlock {
    pub try_scope: ScopeId,
    pub catch_scope: Option<ScopeId>,
    /// The caught exception value, available inside the catch arm.
    pub caught: Option<ValueId>,
    pub finally_scope: Option<ScopeId>,
    outer_scope: ScopeId,
    outer_target: JumpTarget,
    end: JumpTarget,
    finally_target: Option<JumpTarget>,
}

impl ModuleBuilder {
    pub fn emit_label(&mut self, scope: ScopeId, target: JumpTarget) -> CompileResult<()> {
        self.push(scope, Instr::Label { target })
    }

    pub fn jump(&mut self, scope: ScopeId, target: JumpTarget) -> CompileResult<()> {
        self.push(scope, Instr::Jump { target })
    }

    /// Conditional jump: taken when the predicate over `value` evaluates to
    /// `expect`.
    pub fn branch(
        &mut self,
        scope: ScopeId,
        value: ValueId,
        mode: BranchMode,
        expect: bool,
        target: JumpTarget,
    ) -> CompileResult<()> {
        self.check_value(scope, value)?;
        self.push(
            scope,
            Instr::Branch {
                value,
                mode,
                expect,
                target,
            },
        )
    }

    pub fn ret(&mut self, scope: ScopeId, value: Option<ValueId>) -> CompileResult<()> {
        if let Some(v) = value {
            self.check_value(scope, v)?;
        }
        let function = self.scope(scope)?.function;
        // Explicit returns complete the generator instance.
        if self.function_state(function)?.is_generator {
            self.push(scope, Instr::FinishGenerator)?;
        }
        self.push(scope, Instr::Return { value })
    }

    pub fn throw(&mut self, scope: ScopeId, value: ValueId) -> CompileResult<()> {
        self.check_value(scope, value)?;
        let on_error = self.exception_target(scope)?;
        self.push(scope, Instr::Throw { value, on_error })
    }

    // ---- try construct --------------------------------------------------

    /// Open a try construct with the requested arms. At least one of catch
    /// and finally must be present.
    pub fn begin_try(
        &mut self,
        scope: ScopeId,
        want_catch: bool,
        want_finally: bool,
    ) -> CompileResult<TryBlock> {
        if !want_catch && !want_finally {
            return Err(CompileError::EmptyTryConstruct);
        }
        let function = self.scope(scope)?.function;
        let outer_target = self.exception_target(scope)?;
        let end = self.new_target(function, "try_end");
        let catch_target = if want_catch {
            Some(self.new_target(function, "catch"))
        } else {
            None
        };
        let finally_target = if want_finally {
            Some(self.new_target(function, "finally"))
        } else {
            None
        };

        // Failures inside the try arm land on catch when present, else
        // directly on finally with the exception left pending.
        let try_scope = self.child_scope(scope, None)?;
        self.scopes[try_scope.index()].exception_target = catch_target.or(finally_target);

        let (catch_scope, caught) = if let Some(target) = catch_target {
            let s = self.child_scope(scope, None)?;
            // Failures inside catch skip to finally, or leave the construct.
            self.scopes[s.index()].exception_target = Some(finally_target.unwrap_or(outer_target));
            self.push(s, Instr::Label { target })?;
            let dest = self.values.alloc(function, ValueType::OBJECT);
            self.push(s, Instr::CatchException { dest })?;
            (Some(s), Some(dest))
        } else {
            (None, None)
        };

        let finally_scope = if let Some(target) = finally_target {
            let s = self.child_scope(scope, None)?;
            self.scopes[s.index()].exception_target = Some(outer_target);
            self.push(s, Instr::Label { target })?;
            s
        } else {
            return Ok(TryBlock {
                try_scope,
                catch_scope,
                caught,
                finally_scope: None,
                outer_scope: scope,
                outer_target,
                end,
                finally_target: None,
            });
        };

        Ok(TryBlock {
            try_scope,
            catch_scope,
            caught,
            finally_scope: Some(finally_scope),
            outer_scope: scope,
            outer_target,
            end,
            finally_target,
        })
    }

    /// Seal a try construct: completion edges out of each arm, the pending
    /// re-raise after finally, and the join label.
    pub fn end_try(&mut self, block: TryBlock) -> CompileResult<()> {
        let join = block.finally_target.unwrap_or(block.end);

        let falls_through = |b: &Self, s: ScopeId| {
            b.scopes[s.index()]
                .instrs
                .last()
                .map_or(true, |i| !i.ends_flow())
        };

        if falls_through(self, block.try_scope) {
            self.push(block.try_scope, Instr::Jump { target: join })?;
        }
        self.end_scope(block.try_scope)?;

        if let Some(catch_scope) = block.catch_scope {
            if falls_through(self, catch_scope) {
                self.push(catch_scope, Instr::Jump { target: join })?;
            }
            self.end_scope(catch_scope)?;
        }

        if let Some(finally_scope) = block.finally_scope {
            // A pending exception survives the finally arm and re-raises to
            // the enclosing target; normal completion falls out to the join.
            self.push(
                finally_scope,
                Instr::RaisePending {
                    target: block.outer_target,
                },
            )?;
            self.end_scope(finally_scope)?;
        }

        self.push(block.outer_scope, Instr::Label { target: block.end })
    }

    // ---- generators -----------------------------------------------------

    /// Yield `value` to the caller; execution resumes after this point with
    /// the value sent back in.
    pub fn suspend(&mut self, scope: ScopeId, value: ValueId) -> CompileResult<ValueId> {
        self.check_value(scope, value)?;
        let function = self.scope(scope)?.function;
        let state = self.function_state(function)?;
        let yield_to = match (state.is_generator, state.yield_to) {
            (true, Some(t)) => t,
            _ => {
                return Err(CompileError::NotAGenerator {
                    name: state.name.clone(),
                })
            }
        };
        let resume = self.new_target(function, "resume");
        self.functions[function.0 as usize].resume_points.push(resume);
        self.push(
            scope,
            Instr::Suspend {
                value,
                resume,
                yield_to,
            },
        )?;
        self.push(scope, Instr::Label { target: resume })?;
        let dest = self.values.alloc(function, ValueType::OBJECT);
        self.push(scope, Instr::ResumeValue { dest })?;
        Ok(dest)
    }
}
