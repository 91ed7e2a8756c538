//! IR values and side tables
//!
//! Value identifiers are opaque handles into a module-wide table of mutable
//! type cells. Instructions reference identifiers by index, so type widening
//! never aliases a shared mutable object.

use super::ty::ValueType;
use crate::error::{CompileError, CompileResult};
use rustc_hash::FxHashMap;
use std::fmt;

/// Function identifier within one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub u32);

impl FunctionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

/// Scope-builder identifier; indexes the builder's scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope{}", self.0)
    }
}

/// Opaque, function-scoped handle to a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

impl ValueId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One mutable type cell per value identifier.
#[derive(Debug, Clone)]
pub struct ValueCell {
    pub ty: ValueType,
    pub assignable: bool,
    pub owner: FunctionId,
}

/// Module-wide value side table.
#[derive(Debug, Default)]
pub struct ValueTable {
    cells: Vec<ValueCell>,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, owner: FunctionId, ty: ValueType) -> ValueId {
        let id = ValueId(self.cells.len() as u32);
        self.cells.push(ValueCell {
            ty,
            assignable: false,
            owner,
        });
        id
    }

    pub fn alloc_assignable(&mut self, owner: FunctionId, ty: ValueType) -> ValueId {
        let id = self.alloc(owner, ty);
        self.cells[id.index()].assignable = true;
        id
    }

    pub fn ty(&self, id: ValueId) -> ValueType {
        self.cells[id.index()].ty
    }

    /// Widen a cell's type through the lattice. Types never narrow.
    pub fn widen(&mut self, id: ValueId, ty: ValueType) {
        let cell = &mut self.cells[id.index()];
        cell.ty = cell.ty.combine(ty);
    }

    pub fn is_assignable(&self, id: ValueId) -> bool {
        self.cells[id.index()].assignable
    }

    pub fn owner(&self, id: ValueId) -> FunctionId {
        self.cells[id.index()].owner
    }

    /// Enforce the cross-function invariant: an identifier may only appear
    /// in instructions of its owning function.
    pub fn check_owner(&self, id: ValueId, function: FunctionId) -> CompileResult<()> {
        let owner = self.owner(id);
        if owner != function {
            return Err(CompileError::ForeignValue {
                value: id.0,
                owner: owner.0,
                used_in: function.0,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Interned string constant index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrId(pub u32);

impl fmt::Display for StrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "str{}", self.0)
    }
}

/// Compile-time known constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(StrId),
}

impl Constant {
    /// The lattice type a load of this constant produces.
    pub fn value_type(&self) -> ValueType {
        match self {
            Constant::Undefined => ValueType::UNDEFINED,
            Constant::Null => ValueType::NULL,
            Constant::Bool(_) => ValueType::BOOL,
            Constant::Number(_) => ValueType::NUMBER,
            // Strings are heap values in the target runtime.
            Constant::Str(_) => ValueType::OBJECT,
        }
    }

    /// Truthiness, when decidable at compile time.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Constant::Undefined | Constant::Null => Some(false),
            Constant::Bool(b) => Some(*b),
            Constant::Number(n) => Some(*n != 0.0 && !n.is_nan()),
            Constant::Str(_) => None,
        }
    }

    /// Whether the constant is neither undefined nor null.
    pub fn not_nullish(&self) -> bool {
        !matches!(self, Constant::Undefined | Constant::Null)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Undefined => write!(f, "undefined"),
            Constant::Null => write!(f, "null"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Number(n) => write!(f, "{}", n),
            Constant::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Module-unique interned handle for a property or identifier name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(pub u32);

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom{}", self.0)
    }
}

/// Per-module atom interner; one id per distinct string, insertion order
/// preserved for emission.
#[derive(Debug, Default)]
pub struct AtomTable {
    map: FxHashMap<String, Atom>,
    names: Vec<String>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Atom {
        if let Some(&atom) = self.map.get(name) {
            return atom;
        }
        let atom = Atom(self.names.len() as u32);
        self.map.insert(name.to_string(), atom);
        self.names.push(name.to_string());
        atom
    }

    pub fn name(&self, atom: Atom) -> &str {
        &self.names[atom.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }
}

/// Deduplicated string-constant table.
#[derive(Debug, Default)]
pub struct StrTable {
    map: FxHashMap<String, StrId>,
    strings: Vec<String>,
}

impl StrTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, text: &str) -> StrId {
        if let Some(&id) = self.map.get(text) {
            return id;
        }
        let id = StrId(self.strings.len() as u32);
        self.map.insert(text.to_string(), id);
        self.strings.push(text.to_string());
        id
    }

    pub fn text(&self, id: StrId) -> &str {
        &self.strings[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_str())
    }
}

/// A label usable by jumps, branches, exception routing, and generator
/// resume dispatch: a function-unique sequence number plus a human tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JumpTarget {
    pub id: u32,
    pub tag: &'static str,
}

impl JumpTarget {
    pub fn new(id: u32, tag: &'static str) -> Self {
        Self { id, tag }
    }
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}_{}", self.id, self.tag)
    }
}

/// Variable reference identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarRefId(pub u32);

impl VarRefId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarRefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref{}", self.0)
    }
}

/// Scope kind of a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// Dies when its owning sub-scope ends; redeclaration is a defect.
    Block,
    /// Hoisted; lives for the whole function, redeclaration reuses the cell.
    Function,
}

/// A named, independently assignable storage cell, distinct from a value
/// identifier.
#[derive(Debug, Clone)]
pub struct VarRef {
    pub name: String,
    pub ty: ValueType,
    pub known_const: Option<Constant>,
    pub kind: VarKind,
    pub owner: FunctionId,
    /// Cleared for read-only bindings (intrinsic constants); stores are
    /// construction-time defects.
    pub assignable: bool,
    /// Set when a closure captures this cell; forces persistent storage.
    pub captured: bool,
    /// Set when the cell is observed across a generator suspension.
    pub crosses_suspend: bool,
    /// Build-time store count, used to expire `known_const`.
    pub stores: u32,
}

/// Module-wide variable reference table.
#[derive(Debug, Default)]
pub struct VarTable {
    refs: Vec<VarRef>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, owner: FunctionId, name: &str, kind: VarKind) -> VarRefId {
        let id = VarRefId(self.refs.len() as u32);
        self.refs.push(VarRef {
            name: name.to_string(),
            ty: ValueType::EMPTY,
            known_const: None,
            kind,
            owner,
            assignable: true,
            captured: false,
            crosses_suspend: false,
            stores: 0,
        });
        id
    }

    pub fn get(&self, id: VarRefId) -> &VarRef {
        &self.refs[id.index()]
    }

    pub fn get_mut(&mut self, id: VarRefId) -> &mut VarRef {
        &mut self.refs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarRefId, &VarRef)> {
        self.refs
            .iter()
            .enumerate()
            .map(|(i, r)| (VarRefId(i as u32), r))
    }
}

/// Storage group chosen by slot resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotGroup {
    /// Reference cells (variable references).
    Ref,
    /// Plain transient values.
    Value,
    /// Iterator state records.
    Iter,
}

/// A resolved storage slot: group plus index within the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub group: SlotGroup,
    pub index: u32,
}
