//! Value type lattice
//!
//! Bitmask classification of compile-time value knowledge. Types only widen;
//! once the object bit appears the mask collapses to exactly `OBJECT`.

use std::fmt;

/// A widening bitmask over the possible runtime shapes of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValueType(u16);

impl ValueType {
    /// No information yet (pre-first-assignment).
    pub const EMPTY: ValueType = ValueType(0);
    pub const UNDEFINED: ValueType = ValueType(1 << 0);
    pub const NULL: ValueType = ValueType(1 << 1);
    pub const NUMBER: ValueType = ValueType(1 << 2);
    pub const BOOL: ValueType = ValueType(1 << 3);
    pub const OBJECT: ValueType = ValueType(1 << 4);
    /// A function's single return slot; immutable under widening.
    pub const RETURN_VALUE: ValueType = ValueType(1 << 5);
    pub const SUPER: ValueType = ValueType(1 << 6);
    pub const VAR_REF: ValueType = ValueType(1 << 7);
    pub const ITERATOR: ValueType = ValueType(1 << 8);

    /// Raw bitwise union, no lattice rules applied.
    pub const fn union(self, other: ValueType) -> ValueType {
        ValueType(self.0 | other.0)
    }

    /// True if every bit of `other` is present in `self`.
    pub const fn contains(self, other: ValueType) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is present in `self`.
    pub const fn intersects(self, other: ValueType) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Widen `self` by `other`.
    ///
    /// ReturnValue is sticky. An Empty or Undefined left-hand side takes the
    /// right-hand type outright (first assignment sets the type). Otherwise
    /// the union is taken, and any union containing the object bit decays to
    /// exactly `OBJECT`: nothing below object is tracked once an operation
    /// is polymorphic.
    pub fn combine(self, other: ValueType) -> ValueType {
        if self.contains(ValueType::RETURN_VALUE) {
            return self;
        }
        if self.is_empty() || self == ValueType::UNDEFINED {
            return other;
        }
        let merged = self.union(other);
        if merged.intersects(ValueType::OBJECT) {
            ValueType::OBJECT
        } else {
            merged
        }
    }

    /// Whether values of this type need balanced retain/release.
    pub const fn is_retainable(self) -> bool {
        self.intersects(ValueType::OBJECT.union(ValueType::VAR_REF).union(ValueType::ITERATOR))
    }

    /// Whether this type is known to be numeric (and nothing else).
    pub fn is_number(self) -> bool {
        !self.is_empty() && ValueType::NUMBER.contains(self)
    }

    /// Whether this type carries no object, reference, or iterator bits,
    /// i.e. is a plain immediate at runtime.
    pub fn is_primitive(self) -> bool {
        !self.is_retainable() && !self.intersects(ValueType::SUPER)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ValueType, &str); 9] = [
            (ValueType::UNDEFINED, "undefined"),
            (ValueType::NULL, "null"),
            (ValueType::NUMBER, "number"),
            (ValueType::BOOL, "bool"),
            (ValueType::OBJECT, "object"),
            (ValueType::RETURN_VALUE, "retval"),
            (ValueType::SUPER, "super"),
            (ValueType::VAR_REF, "varref"),
            (ValueType::ITERATOR, "iterator"),
        ];
        if self.is_empty() {
            return write!(f, "empty");
        }
        let mut first = true;
        for (bit, name) in NAMES {
            if self.intersects(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        Ok(())
    }
}
