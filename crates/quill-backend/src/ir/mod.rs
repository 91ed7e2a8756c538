//! Intermediate representation
//!
//! Value lattice, side tables, the closed instruction set, and the finalized
//! per-module / per-function containers handed from the resolver to the
//! transform pipeline and emitter.

mod instr;
pub mod pretty;
mod ty;
mod value;
pub mod verify;

pub use instr::{BinaryOp, BranchMode, CallArgs, Instr, RefUse, UnaryOp};
pub use ty::ValueType;
pub use value::{
    Atom, AtomTable, Constant, FunctionId, JumpTarget, ScopeId, Slot, SlotGroup, StrId, StrTable,
    ValueCell, ValueId, ValueTable, VarKind, VarRef, VarRefId, VarTable,
};

use rustc_hash::FxHashMap;

/// Function shape, selecting the emitted parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Ordinary,
    Arrow,
    Method,
    Constructor,
}

impl FunctionKind {
    /// Constructors receive the new-target in addition to the receiver.
    pub fn has_new_target(&self) -> bool {
        matches!(self, FunctionKind::Constructor)
    }
}

/// One closure-captured cell: the outer function's reference and the inner
/// function's local stand-in, in closure-argument order.
#[derive(Debug, Clone)]
pub struct CaptureSlot {
    pub outer: VarRefId,
    pub inner: VarRefId,
    pub name: String,
}

/// Per-group slot totals decided by slot resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCounts {
    pub refs: u32,
    pub values: u32,
    pub iters: u32,
}

/// One flattened, per-function instruction stream.
#[derive(Debug)]
pub struct FunctionIr {
    pub id: FunctionId,
    pub name: String,
    pub kind: FunctionKind,
    pub is_generator: bool,
    pub param_count: u32,
    pub instrs: Vec<Instr>,
    pub captures: Vec<CaptureSlot>,
    pub resume_points: Vec<JumpTarget>,
    /// Generator return slot: every suspension writes the yielded value
    /// here before jumping to the yield exit.
    pub ret_slot: Option<ValueId>,
    /// Locals live in a heap-allocated per-call structure (generator, or any
    /// closure-captured local). Decided by slot resolution.
    pub heap_frame: bool,
    pub slot_counts: SlotCounts,
    pub value_slots: FxHashMap<ValueId, Slot>,
    pub ref_slots: FxHashMap<VarRefId, u32>,
}

impl FunctionIr {
    /// Total number of instructions in the stream.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}

/// A fully built module: flattened functions plus the shared side tables.
#[derive(Debug)]
pub struct ModuleIr {
    pub name: String,
    pub functions: Vec<FunctionIr>,
    pub values: ValueTable,
    pub vars: VarTable,
    pub atoms: AtomTable,
    pub strings: StrTable,
    /// Size of the module-wide inline-cache table; set by the allocator.
    pub property_cache_size: u32,
}

impl ModuleIr {
    pub fn function(&self, id: FunctionId) -> Option<&FunctionIr> {
        self.functions.iter().find(|f| f.id == id)
    }
}
