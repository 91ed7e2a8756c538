//! Variable context
//!
//! Per-function name resolution: a chain of frames, each holding bindings to
//! variable references, variable delegates (computed pseudo-variables), or
//! lazily materialized variables. Each function owns its own context; the
//! builder crosses function boundaries explicitly, turning outer hits into
//! memoized closure captures.

use crate::error::{CompileError, CompileResult};
use crate::ir::{ScopeId, ValueId, VarRefId};
use rustc_hash::FxHashMap;
use std::fmt;

/// Frame identifier within one function's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame{}", self.0)
    }
}

/// Delegate identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateId(pub u32);

impl DelegateId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Lazy-variable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LazyId(pub u32);

impl LazyId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// What a name resolves to inside one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Ref(VarRefId),
    Delegate(DelegateId),
    Lazy(LazyId),
}

/// A computed pseudo-variable standing in for a real one.
#[derive(Debug, Clone)]
pub struct Delegate {
    pub kind: DelegateKind,
    /// Materialized value, filled on first load.
    pub cached: Option<ValueId>,
}

/// The computed sources a delegate can stand in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateKind {
    /// The lazily-synthesized receiver (`this`).
    Receiver,
    /// The construction target (`new.target`).
    NewTarget,
}

/// Deferred variable: construction is replayed into the scope captured at
/// registration time, not at first use.
#[derive(Debug, Clone)]
pub struct LazyVar {
    pub name: String,
    pub init: LazyInit,
    /// Scope reserved at the registration point; init instructions land
    /// there so declaration order is preserved in the output.
    pub home: ScopeId,
    pub materialized: Option<VarRefId>,
}

/// Recipes for lazy-variable construction.
#[derive(Debug, Clone, Copy)]
pub enum LazyInit {
    /// Load a process-wide intrinsic constant by name.
    Intrinsic(&'static str),
}

#[derive(Debug, Default)]
struct Frame {
    parent: Option<FrameId>,
    bindings: FxHashMap<String, Binding>,
}

/// One function's frame chain.
#[derive(Debug, Default)]
pub struct VariableContext {
    frames: Vec<Frame>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a frame; `parent` is `None` only for the function root.
    pub fn new_frame(&mut self, parent: Option<FrameId>) -> FrameId {
        let id = FrameId(self.frames.len() as u32);
        self.frames.push(Frame {
            parent,
            bindings: FxHashMap::default(),
        });
        id
    }

    /// Register a binding in `frame`. Duplicate names within one frame are
    /// construction-time defects.
    pub fn bind(&mut self, frame: FrameId, name: &str, binding: Binding) -> CompileResult<()> {
        let f = &mut self.frames[frame.index()];
        if f.bindings.contains_key(name) {
            return Err(CompileError::DuplicateBinding {
                name: name.to_string(),
            });
        }
        f.bindings.insert(name.to_string(), binding);
        Ok(())
    }

    /// Replace an existing binding (lazy materialization, hoisted reuse).
    pub fn rebind(&mut self, frame: FrameId, name: &str, binding: Binding) {
        self.frames[frame.index()]
            .bindings
            .insert(name.to_string(), binding);
    }

    /// Resolve within exactly one frame.
    pub fn lookup_local(&self, frame: FrameId, name: &str) -> Option<Binding> {
        self.frames[frame.index()].bindings.get(name).copied()
    }

    /// Resolve by walking the frame chain of this function only. Returns the
    /// binding together with the frame it was found in.
    pub fn lookup(&self, frame: FrameId, name: &str) -> Option<(FrameId, Binding)> {
        let mut cursor = Some(frame);
        while let Some(id) = cursor {
            if let Some(binding) = self.frames[id.index()].bindings.get(name) {
                return Some((id, *binding));
            }
            cursor = self.frames[id.index()].parent;
        }
        None
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}
