//! The `Relation` lattice used by `Cmp`, `Confirm` and switch-free
//! branch refinement.
//!
//! Per §4.2: "Relation values form a 6-bit lattice over {less, equal,
//! greater, unordered}." Four of the six bit positions carry meaning
//! today (`LESS`, `EQUAL`, `GREATER`, `UNORDERED`); the remaining two are
//! reserved so that the lattice's storage width matches the spec's
//! wording exactly, the way libfirm's `ir_relation` leaves headroom in
//! its bitset for relation modifiers that no in-tree pass currently sets.

use core::fmt;

use crate::error::{Error, Result};

bitflags::bitflags! {
    /// A (possibly combined) relation between two values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Relation: u8 {
        /// `a < b`.
        const LESS      = 0b0000_0001;
        /// `a == b`.
        const EQUAL     = 0b0000_0010;
        /// `a > b`.
        const GREATER   = 0b0000_0100;
        /// Incomparable (NaN involved).
        const UNORDERED = 0b0000_1000;
        /// Reserved lattice bit, currently unused by any rule.
        const RESERVED1 = 0b0001_0000;
        /// Reserved lattice bit, currently unused by any rule.
        const RESERVED2 = 0b0010_0000;
    }
}

impl Relation {
    /// No relation holds (the empty/`False` element of the lattice).
    pub const FALSE: Relation = Relation::empty();
    /// `<=`.
    pub const LESS_EQUAL: Relation = Relation::LESS.union(Relation::EQUAL);
    /// `>=`.
    pub const GREATER_EQUAL: Relation = Relation::GREATER.union(Relation::EQUAL);
    /// `!=` in the ordered sense (`<` or `>`), i.e. "less-or-greater".
    pub const LESS_GREATER: Relation = Relation::LESS.union(Relation::GREATER);
    /// Every ordered relation holds (equivalent to "is comparable").
    pub const ORDERED: Relation = Relation::LESS_GREATER.union(Relation::EQUAL);
    /// Every relation holds (the `True` element of the lattice).
    pub const TRUE: Relation = Relation::ORDERED.union(Relation::UNORDERED);

    /// Parses a `Relation` from raw bits, rejecting bits outside the
    /// defined lattice.
    pub fn from_bits_checked(bits: u8) -> Result<Self> {
        Relation::from_bits(bits).ok_or(Error::BadRelation(bits))
    }

    /// The logical inverse of this relation: the complement within
    /// `TRUE`, used when the Confirm pass follows the false projection
    /// of a `Cond` (§4.8, "if we are on the false projection, invert
    /// `rel`").
    pub fn inverse(self) -> Relation {
        Relation::TRUE - self
    }

    /// `true` if this relation includes `EQUAL` and nothing else besides
    /// possibly `UNORDERED`.
    pub fn is_equality(self) -> bool {
        self == Relation::EQUAL
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("false");
        }
        if *self == Relation::TRUE {
            return f.write_str("true");
        }
        let mut parts = std::vec::Vec::new();
        if self.contains(Relation::LESS) {
            parts.push("less");
        }
        if self.contains(Relation::EQUAL) {
            parts.push("equal");
        }
        if self.contains(Relation::GREATER) {
            parts.push("greater");
        }
        if self.contains(Relation::UNORDERED) {
            parts.push("unordered");
        }
        write!(f, "{}", parts.join("|"))
    }
}

// `bitflags` already implements `BitOr`/`BitAnd`/`BitXor`/`Not`/`Sub` for
// the generated type (`|`, `&`, `^`, `!`, `-` read as union, intersection,
// symmetric difference, complement, difference). `!rel` therefore means
// "every bit not in rel" rather than `rel.inverse()` — callers that want
// the confirm-pass sense of "invert within TRUE" must call `.inverse()`
// explicitly (§4.8, "invert `rel`").
