//! Scope-builder tree
//!
//! The public authoring surface. A front end drives one `ModuleBuilder` per
//! module: functions are opened, scopes nested, instructions appended, and
//! names resolved through per-function variable contexts. Scopes live in an
//! arena addressed by `ScopeId`; a child occupies its parent's instruction
//! order through a `Stub` placeholder, so every scope can be authored
//! top-to-bottom while the tree is still being attached.

mod control;
mod expr;

pub use control::TryBlock;

use crate::context::{
    Binding, Delegate, DelegateId, DelegateKind, FrameId, LazyId, LazyInit, LazyVar,
    VariableContext,
};
use crate::error::{CompileError, CompileResult};
use crate::intrinsics;
use crate::ir::verify::verify_module;
use crate::ir::{
    Atom, AtomTable, CaptureSlot, Constant, FunctionId, FunctionKind, Instr, JumpTarget, ModuleIr,
    ScopeId, SlotCounts, StrId, StrTable, ValueId, ValueTable, ValueType, VarKind, VarRefId,
    VarTable,
};
use crate::resolve;
use rustc_hash::FxHashMap;

/// One node of the scope tree.
#[derive(Debug)]
pub(crate) struct ScopeData {
    pub function: FunctionId,
    pub parent: Option<ScopeId>,
    pub frame: FrameId,
    pub instrs: Vec<Instr>,
    pub exception_target: Option<JumpTarget>,
    pub closed: bool,
}

/// Builder-side state of one function while it is authored.
#[derive(Debug)]
pub(crate) struct FunctionState {
    pub name: String,
    pub kind: FunctionKind,
    pub is_generator: bool,
    /// Lexical parent and the frame active at the creation point.
    pub parent: Option<(FunctionId, FrameId)>,
    pub context: VariableContext,
    pub delegates: Vec<Delegate>,
    pub lazies: Vec<LazyVar>,
    pub root_scope: ScopeId,
    /// Parameter loads and other entry materializations land here.
    pub params_scope: ScopeId,
    /// Reserved for the generator re-entry dispatch.
    pub prologue_scope: ScopeId,
    pub next_target: u32,
    /// Function-exit exception target; active unless a scope overrides it.
    pub bail: JumpTarget,
    pub yield_to: Option<JumpTarget>,
    /// The single return slot every suspension writes before jumping to
    /// the yield exit.
    pub ret_slot: Option<ValueId>,
    pub resume_points: Vec<JumpTarget>,
    pub captures: Vec<CaptureSlot>,
    pub capture_memo: FxHashMap<VarRefId, VarRefId>,
    /// Values known to hold a specific constant at build time.
    pub const_values: FxHashMap<ValueId, Constant>,
    pub param_count: u32,
    pub closed: bool,
}

/// The module authoring surface.
#[derive(Debug)]
pub struct ModuleBuilder {
    name: String,
    pub(crate) values: ValueTable,
    pub(crate) vars: VarTable,
    pub(crate) atoms: AtomTable,
    pub(crate) strings: StrTable,
    pub(crate) functions: Vec<FunctionState>,
    pub(crate) scopes: Vec<ScopeData>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: ValueTable::new(),
            vars: VarTable::new(),
            atoms: AtomTable::new(),
            strings: StrTable::new(),
            functions: Vec::new(),
            scopes: Vec::new(),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.name
    }

    pub fn intern_atom(&mut self, name: &str) -> Atom {
        self.atoms.intern(name)
    }

    pub fn intern_string(&mut self, text: &str) -> StrId {
        self.strings.intern(text)
    }

    // ---- functions ------------------------------------------------------

    /// Open a new function. `parent_scope` is the scope in which the closure
    /// expression appears; `None` for a module's top-level function.
    pub fn begin_function(
        &mut self,
        name: &str,
        kind: FunctionKind,
        parent_scope: Option<ScopeId>,
        is_generator: bool,
    ) -> CompileResult<(FunctionId, ScopeId)> {
        let id = FunctionId(self.functions.len() as u32);
        let parent = match parent_scope {
            Some(s) => {
                let data = self.scope(s)?;
                Some((data.function, data.frame))
            }
            None => None,
        };

        let mut context = VariableContext::new();
        let root_frame = context.new_frame(None);

        let bail = JumpTarget::new(0, "bail");
        let mut next_target = 1;
        let yield_to = if is_generator {
            let t = JumpTarget::new(next_target, "yield");
            next_target += 1;
            Some(t)
        } else {
            None
        };
        let ret_slot = if is_generator {
            Some(self.values.alloc_assignable(id, ValueType::OBJECT))
        } else {
            None
        };

        let root_scope = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            function: id,
            parent: None,
            frame: root_frame,
            instrs: Vec::new(),
            exception_target: Some(bail),
            closed: false,
        });

        let mut state = FunctionState {
            name: name.to_string(),
            kind,
            is_generator,
            parent,
            context,
            delegates: Vec::new(),
            lazies: Vec::new(),
            root_scope,
            params_scope: root_scope,
            prologue_scope: root_scope,
            next_target,
            bail,
            yield_to,
            ret_slot,
            resume_points: Vec::new(),
            captures: Vec::new(),
            capture_memo: FxHashMap::default(),
            const_values: FxHashMap::default(),
            param_count: 0,
            closed: false,
        };

        // The receiver is a delegate: materialized lazily on first use.
        if !matches!(kind, FunctionKind::Arrow) {
            let d = DelegateId(state.delegates.len() as u32);
            state.delegates.push(Delegate {
                kind: DelegateKind::Receiver,
                cached: None,
            });
            state.context.bind(root_frame, "this", Binding::Delegate(d))?;
        }
        if kind.has_new_target() {
            let d = DelegateId(state.delegates.len() as u32);
            state.delegates.push(Delegate {
                kind: DelegateKind::NewTarget,
                cached: None,
            });
            state
                .context
                .bind(root_frame, "new.target", Binding::Delegate(d))?;
        }

        self.functions.push(state);

        // The re-entry dispatch flattens ahead of parameter and receiver
        // materialization: a resume jumps straight past the entry code,
        // which only the first call runs.
        let prologue_scope = self.child_scope(root_scope, Some(root_frame))?;
        let params_scope = self.child_scope(root_scope, Some(root_frame))?;
        let state = &mut self.functions[id.0 as usize];
        state.params_scope = params_scope;
        state.prologue_scope = prologue_scope;

        // Intrinsic constants resolve through lazy registration; their init
        // replays at function entry.
        for name in intrinsics::intrinsic_names() {
            let lazy = LazyId(self.functions[id.0 as usize].lazies.len() as u32);
            self.functions[id.0 as usize].lazies.push(LazyVar {
                name: name.to_string(),
                init: LazyInit::Intrinsic(name),
                home: params_scope,
                materialized: None,
            });
            let frame = self.scopes[root_scope.index()].frame;
            self.functions[id.0 as usize]
                .context
                .bind(frame, name, Binding::Lazy(lazy))?;
        }

        Ok((id, root_scope))
    }

    /// Declare the next positional parameter; its value is loaded at entry
    /// and bound as a hoisted variable reference.
    pub fn declare_param(&mut self, function: FunctionId, name: &str) -> CompileResult<VarRefId> {
        let state = self.function_state(function)?;
        if state.closed {
            return Err(CompileError::internal(format!(
                "parameter declared on finalized function `{}`",
                state.name
            )));
        }
        let index = state.param_count;
        let params_scope = state.params_scope;

        let arg = self.values.alloc(function, ValueType::OBJECT);
        self.push(params_scope, Instr::LoadArg { dest: arg, index })?;
        let var = self.declare_var_in(params_scope, name, VarKind::Function)?;
        self.store_var(params_scope, var, arg)?;
        self.functions[function.0 as usize].param_count = index + 1;
        Ok(var)
    }

    /// Finalize a function: generator dispatch, implicit return, and the
    /// exception epilogue.
    pub fn end_function(&mut self, function: FunctionId) -> CompileResult<()> {
        let state = self.function_state(function)?;
        if state.closed {
            return Err(CompileError::internal(format!(
                "function `{}` finalized twice",
                state.name
            )));
        }
        let root = state.root_scope;
        let params = state.params_scope;
        let prologue = state.prologue_scope;
        let bail = state.bail;
        let is_generator = state.is_generator;
        let yield_to = state.yield_to;
        let ret_slot = state.ret_slot;
        let resume_points = state.resume_points.clone();

        if is_generator {
            self.push(
                prologue,
                Instr::ResumeDispatch {
                    targets: resume_points,
                },
            )?;
        }

        let needs_return = self.scopes[root.index()]
            .instrs
            .last()
            .map_or(true, |i| !i.ends_flow());
        if needs_return {
            if is_generator {
                self.push(root, Instr::FinishGenerator)?;
            }
            self.push(root, Instr::Return { value: None })?;
        }

        // Epilogue: the propagate path, and for generators the yield exit.
        self.push(root, Instr::Label { target: bail })?;
        self.push(root, Instr::Propagate)?;
        if let Some(yield_to) = yield_to {
            let slot = ret_slot.ok_or_else(|| {
                CompileError::internal("generator without a return slot".to_string())
            })?;
            self.push(root, Instr::Label { target: yield_to })?;
            self.push(root, Instr::Return { value: Some(slot) })?;
        }

        // Close entry scopes and any never-materialized lazy homes.
        self.scopes[params.index()].closed = true;
        self.scopes[prologue.index()].closed = true;
        let homes: Vec<ScopeId> = self.functions[function.0 as usize]
            .lazies
            .iter()
            .map(|l| l.home)
            .collect();
        for home in homes {
            self.scopes[home.index()].closed = true;
        }
        self.scopes[root.index()].closed = true;
        self.functions[function.0 as usize].closed = true;
        Ok(())
    }

    // ---- scopes ---------------------------------------------------------

    /// Open a lexical block sharing the parent's variable frame.
    pub fn begin_block(&mut self, parent: ScopeId) -> CompileResult<ScopeId> {
        let frame = self.scope(parent)?.frame;
        self.child_scope(parent, Some(frame))
    }

    /// Open a scoped child with a forked variable frame; block-scoped names
    /// declared inside die when it closes.
    pub fn begin_scoped(&mut self, parent: ScopeId) -> CompileResult<ScopeId> {
        self.child_scope(parent, None)
    }

    pub fn end_scope(&mut self, scope: ScopeId) -> CompileResult<()> {
        let data = self.scope(scope)?;
        if data.closed {
            return Err(CompileError::ClosedScope { scope: scope.0 });
        }
        self.scopes[scope.index()].closed = true;
        Ok(())
    }

    /// Create a child scope, leaving a stub at the parent's current
    /// position. `frame`: `None` forks the parent frame.
    pub(crate) fn child_scope(
        &mut self,
        parent: ScopeId,
        frame: Option<FrameId>,
    ) -> CompileResult<ScopeId> {
        let parent_data = self.scope(parent)?;
        if parent_data.closed {
            return Err(CompileError::ClosedScope { scope: parent.0 });
        }
        let function = parent_data.function;
        let parent_frame = parent_data.frame;
        let frame = match frame {
            Some(f) => f,
            None => self.functions[function.0 as usize]
                .context
                .new_frame(Some(parent_frame)),
        };
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            function,
            parent: Some(parent),
            frame,
            instrs: Vec::new(),
            exception_target: None,
            closed: false,
        });
        self.scopes[parent.index()].instrs.push(Instr::Stub { scope: id });
        Ok(id)
    }

    pub(crate) fn scope(&self, id: ScopeId) -> CompileResult<&ScopeData> {
        self.scopes
            .get(id.index())
            .ok_or_else(|| CompileError::internal(format!("unknown scope {}", id)))
    }

    pub(crate) fn function_state(&self, id: FunctionId) -> CompileResult<&FunctionState> {
        self.functions
            .get(id.0 as usize)
            .ok_or_else(|| CompileError::internal(format!("unknown function {}", id)))
    }

    pub(crate) fn push(&mut self, scope: ScopeId, instr: Instr) -> CompileResult<()> {
        let data = self.scope(scope)?;
        if data.closed {
            return Err(CompileError::ClosedScope { scope: scope.0 });
        }
        self.scopes[scope.index()].instrs.push(instr);
        Ok(())
    }

    /// Resolve the active exception target through the scope chain.
    pub(crate) fn exception_target(&self, scope: ScopeId) -> CompileResult<JumpTarget> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let data = self.scope(id)?;
            if let Some(target) = data.exception_target {
                return Ok(target);
            }
            cursor = data.parent;
        }
        Err(CompileError::NoExceptionTarget)
    }

    pub(crate) fn check_value(&self, scope: ScopeId, value: ValueId) -> CompileResult<()> {
        let function = self.scope(scope)?.function;
        self.values.check_owner(value, function)
    }

    /// Allocate a function-unique jump target.
    pub fn new_target(&mut self, function: FunctionId, tag: &'static str) -> JumpTarget {
        let state = &mut self.functions[function.0 as usize];
        let id = state.next_target;
        state.next_target += 1;
        JumpTarget::new(id, tag)
    }

    // ---- name resolution ------------------------------------------------

    /// Shallow resolution: current function only, no side effects. Used to
    /// detect redeclaration.
    pub fn resolve_shallow(&self, scope: ScopeId, name: &str) -> CompileResult<Option<Binding>> {
        let data = self.scope(scope)?;
        let state = self.function_state(data.function)?;
        Ok(state.context.lookup(data.frame, name).map(|(_, b)| b))
    }

    /// Full resolution: walks to the root, crossing function boundaries.
    /// A hit behind a function boundary becomes a memoized closure capture.
    /// `None` means a global/free reference.
    pub fn load_name(&mut self, scope: ScopeId, name: &str) -> CompileResult<Option<ValueId>> {
        let data = self.scope(scope)?;
        let function = data.function;
        let frame = data.frame;
        match self.resolve_full(function, frame, name)? {
            None => Ok(None),
            Some(Binding::Ref(var)) => Ok(Some(self.load_var(scope, var)?)),
            Some(Binding::Delegate(d)) => Ok(Some(self.materialize_delegate(function, d)?)),
            Some(Binding::Lazy(_)) => Err(CompileError::internal(
                "lazy binding survived full resolution".to_string(),
            )),
        }
    }

    /// Store into a name resolved like [`Self::load_name`]. `Ok(None)`
    /// means the name is free; computed bindings (the receiver, the
    /// construction target) and read-only bindings reject the store.
    pub fn store_name(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: ValueId,
    ) -> CompileResult<Option<()>> {
        let data = self.scope(scope)?;
        let function = data.function;
        let frame = data.frame;
        match self.resolve_full(function, frame, name)? {
            None => Ok(None),
            Some(Binding::Ref(var)) => {
                self.store_var(scope, var, value)?;
                Ok(Some(()))
            }
            Some(Binding::Delegate(_)) => Err(CompileError::NotAssignable {
                name: name.to_string(),
            }),
            Some(Binding::Lazy(_)) => Err(CompileError::internal(
                "lazy binding survived full resolution".to_string(),
            )),
        }
    }

    fn resolve_full(
        &mut self,
        function: FunctionId,
        frame: FrameId,
        name: &str,
    ) -> CompileResult<Option<Binding>> {
        let hit = self.functions[function.0 as usize]
            .context
            .lookup(frame, name);
        if let Some((found_frame, binding)) = hit {
            return match binding {
                Binding::Lazy(lazy) => {
                    let var = self.materialize_lazy(function, found_frame, lazy)?;
                    Ok(Some(Binding::Ref(var)))
                }
                other => Ok(Some(other)),
            };
        }
        let Some((parent, parent_frame)) = self.functions[function.0 as usize].parent else {
            return Ok(None);
        };
        match self.resolve_full(parent, parent_frame, name)? {
            None => Ok(None),
            Some(Binding::Ref(outer)) => {
                let inner = self.capture(function, outer)?;
                Ok(Some(Binding::Ref(inner)))
            }
            Some(Binding::Delegate(_)) => Err(CompileError::UncapturableBinding {
                name: name.to_string(),
            }),
            Some(Binding::Lazy(_)) => Err(CompileError::internal(
                "lazy binding crossed a function boundary".to_string(),
            )),
        }
    }

    /// Request a closure argument for `outer` from this function's parent,
    /// memoizing so repeated lookups return the identical capture handle.
    fn capture(&mut self, function: FunctionId, outer: VarRefId) -> CompileResult<VarRefId> {
        if let Some(&inner) = self.functions[function.0 as usize]
            .capture_memo
            .get(&outer)
        {
            return Ok(inner);
        }
        self.vars.get_mut(outer).captured = true;
        let name = self.vars.get(outer).name.clone();
        let outer_ty = self.vars.get(outer).ty;

        let inner = self.vars.alloc(function, &name, VarKind::Function);
        {
            let cell = self.vars.get_mut(inner);
            cell.captured = true;
            cell.ty = outer_ty;
        }
        let state = &mut self.functions[function.0 as usize];
        state.captures.push(CaptureSlot {
            outer,
            inner,
            name,
        });
        state.capture_memo.insert(outer, inner);
        Ok(inner)
    }

    fn materialize_delegate(
        &mut self,
        function: FunctionId,
        delegate: DelegateId,
    ) -> CompileResult<ValueId> {
        if let Some(cached) = self.functions[function.0 as usize].delegates[delegate.index()].cached
        {
            return Ok(cached);
        }
        let kind = self.functions[function.0 as usize].delegates[delegate.index()].kind;
        let params_scope = self.functions[function.0 as usize].params_scope;
        let dest = self.values.alloc(function, ValueType::OBJECT);
        let instr = match kind {
            DelegateKind::Receiver => Instr::LoadThis { dest },
            DelegateKind::NewTarget => Instr::LoadNewTarget { dest },
        };
        self.push(params_scope, instr)?;
        self.functions[function.0 as usize].delegates[delegate.index()].cached = Some(dest);
        Ok(dest)
    }

    fn materialize_lazy(
        &mut self,
        function: FunctionId,
        frame: FrameId,
        lazy: LazyId,
    ) -> CompileResult<VarRefId> {
        if let Some(var) = self.functions[function.0 as usize].lazies[lazy.index()].materialized {
            return Ok(var);
        }
        let (name, init, home) = {
            let l = &self.functions[function.0 as usize].lazies[lazy.index()];
            (l.name.clone(), l.init, l.home)
        };
        let constant = match init {
            LazyInit::Intrinsic(key) => intrinsics::intrinsic_constant(key).ok_or_else(|| {
                CompileError::internal(format!("unknown intrinsic `{}`", key))
            })?,
        };

        // Replay the constructor's instructions at the registration point.
        let value = self.values.alloc(function, constant.value_type());
        self.push(home, Instr::LoadConst { dest: value, value: constant })?;
        let var = self.vars.alloc(function, &name, VarKind::Function);
        self.push(home, Instr::DeclareRef { var })?;
        self.push(home, Instr::StoreRef { var, value })?;
        {
            let cell = self.vars.get_mut(var);
            cell.ty = constant.value_type();
            cell.known_const = Some(constant);
            cell.stores = 1;
            // Intrinsic constants are read-only bindings.
            cell.assignable = false;
        }
        self.functions[function.0 as usize].const_values.insert(value, constant);
        self.functions[function.0 as usize].lazies[lazy.index()].materialized = Some(var);
        let state = &mut self.functions[function.0 as usize];
        state.context.rebind(frame, &name, Binding::Ref(var));
        Ok(var)
    }

    /// Register a computed pseudo-variable in the current frame.
    pub fn register_delegate(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: DelegateKind,
    ) -> CompileResult<DelegateId> {
        let data = self.scope(scope)?;
        let function = data.function;
        let frame = data.frame;
        let id = DelegateId(self.functions[function.0 as usize].delegates.len() as u32);
        self.functions[function.0 as usize].delegates.push(Delegate { kind, cached: None });
        self.functions[function.0 as usize]
            .context
            .bind(frame, name, Binding::Delegate(id))?;
        Ok(id)
    }

    /// Register a lazily constructed variable. Its init instructions replay
    /// at this program point when the name is first resolved.
    pub fn register_lazy(
        &mut self,
        scope: ScopeId,
        name: &str,
        init: LazyInit,
    ) -> CompileResult<LazyId> {
        let data = self.scope(scope)?;
        let function = data.function;
        let frame = data.frame;
        let home = self.child_scope(scope, Some(frame))?;
        let id = LazyId(self.functions[function.0 as usize].lazies.len() as u32);
        self.functions[function.0 as usize].lazies.push(LazyVar {
            name: name.to_string(),
            init,
            home,
            materialized: None,
        });
        self.functions[function.0 as usize]
            .context
            .bind(frame, name, Binding::Lazy(id))?;
        Ok(id)
    }

    // ---- variable references --------------------------------------------

    /// Declare a variable in the given scope. Block-scoped redeclaration in
    /// one frame is a defect; a hoisted name reuses the existing cell.
    pub fn declare_var(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: VarKind,
    ) -> CompileResult<VarRefId> {
        self.declare_var_in(scope, name, kind)
    }

    fn declare_var_in(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: VarKind,
    ) -> CompileResult<VarRefId> {
        let data = self.scope(scope)?;
        let function = data.function;
        let frame = data.frame;

        if kind == VarKind::Function {
            // Hoisted: redeclaration anywhere in the function reuses the cell.
            if let Some(Binding::Ref(existing)) = self
                .functions[function.0 as usize]
                .context
                .lookup(frame, name)
                .map(|(_, b)| b)
            {
                if self.vars.get(existing).kind == VarKind::Function
                    && self.vars.get(existing).owner == function
                {
                    return Ok(existing);
                }
            }
        }

        let var = self.vars.alloc(function, name, kind);
        self.functions[function.0 as usize]
            .context
            .bind(frame, name, Binding::Ref(var))?;
        self.push(scope, Instr::DeclareRef { var })?;
        Ok(var)
    }

    /// Load a variable reference's current content.
    pub fn load_var(&mut self, scope: ScopeId, var: VarRefId) -> CompileResult<ValueId> {
        let function = self.scope(scope)?.function;
        let cell = self.vars.get(var);

        // Known-constant references load as literals.
        if let Some(constant) = cell.known_const {
            let dest = self.values.alloc(function, constant.value_type());
            self.functions[function.0 as usize].const_values.insert(dest, constant);
            self.push(scope, Instr::LoadConst { dest, value: constant })?;
            return Ok(dest);
        }

        let ty = if cell.ty.is_empty() {
            ValueType::UNDEFINED
        } else {
            cell.ty
        };
        let dest = self.values.alloc(function, ty);
        self.push(scope, Instr::LoadRef { dest, var })?;
        Ok(dest)
    }

    /// Store into a variable reference, widening its type.
    pub fn store_var(&mut self, scope: ScopeId, var: VarRefId, value: ValueId) -> CompileResult<()> {
        self.check_value(scope, value)?;
        let function = self.scope(scope)?.function;
        {
            let cell = self.vars.get(var);
            if !cell.assignable {
                return Err(CompileError::NotAssignable {
                    name: cell.name.clone(),
                });
            }
        }
        let ty = self.values.ty(value);
        let constant = self.functions[function.0 as usize].const_values.get(&value).copied();
        {
            let cell = self.vars.get_mut(var);
            cell.ty = cell.ty.combine(ty);
            cell.known_const = match (cell.stores, constant) {
                (0, Some(c)) => Some(c),
                _ => None,
            };
            cell.stores += 1;
        }
        self.push(scope, Instr::StoreRef { var, value })
    }

    // ---- finalization ---------------------------------------------------

    /// Flatten every function's scope tree, verify, and hand the module to
    /// the pipeline.
    pub fn finish(self) -> CompileResult<ModuleIr> {
        for state in &self.functions {
            if !state.closed {
                return Err(CompileError::UnclosedFunction {
                    name: state.name.clone(),
                });
            }
        }
        for (index, scope) in self.scopes.iter().enumerate() {
            if !scope.closed {
                return Err(CompileError::UnclosedScope { scope: index as u32 });
            }
        }

        let mut functions = Vec::with_capacity(self.functions.len());
        for (index, state) in self.functions.iter().enumerate() {
            let id = FunctionId(index as u32);
            let instrs = resolve::flatten(&self.scopes, state.root_scope)?;
            functions.push(crate::ir::FunctionIr {
                id,
                name: state.name.clone(),
                kind: state.kind,
                is_generator: state.is_generator,
                param_count: state.param_count,
                instrs,
                captures: state.captures.clone(),
                resume_points: state.resume_points.clone(),
                ret_slot: state.ret_slot,
                heap_frame: false,
                slot_counts: SlotCounts::default(),
                value_slots: FxHashMap::default(),
                ref_slots: FxHashMap::default(),
            });
        }

        // References touched inside a suspending generator live across
        // re-entry; they must keep persistent storage.
        let mut vars = self.vars;
        for func in &functions {
            let suspends = func
                .instrs
                .iter()
                .any(|i| matches!(i, Instr::Suspend { .. }));
            if func.is_generator && suspends {
                for instr in &func.instrs {
                    if let Some((var, _)) = instr.ref_use() {
                        vars.get_mut(var).crosses_suspend = true;
                    }
                }
            }
        }

        let module = ModuleIr {
            name: self.name,
            functions,
            values: self.values,
            vars,
            atoms: self.atoms,
            strings: self.strings,
            property_cache_size: 0,
        };
        verify_module(&module)?;
        Ok(module)
    }
}
