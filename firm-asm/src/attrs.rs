//! Per-opcode attribute payloads (§3: "per-opcode attributes (e.g.,
//! constant tarval, Proj number, Cmp relation, Switch table)").

use firm_types::{Relation, Tarval};

/// A lightweight, crate-local reference to a linker-visible entity
/// (method, global, field, parameter). The full [`Entity`] record lives
/// in `firm-ir::ty`, which this crate does not depend on; `firm-ir`
/// resolves an `EntityRef` through its own entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityRef(pub u32);

/// Attributes of a `Const` node.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstAttr {
    /// The constant value.
    pub value: Tarval,
}

/// Attributes of a `SymConst` node (the address of an entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymConstAttr {
    /// The referenced entity.
    pub entity: EntityRef,
}

/// Attributes of a `Proj` node: which component of a tuple it extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProjAttr {
    /// The projection number. `Cond`'s two projections use the
    /// reserved numbers [`ProjAttr::COND_FALSE`] / [`ProjAttr::COND_TRUE`].
    pub num: u32,
}

impl ProjAttr {
    /// `Cond`'s false-branch projection number.
    pub const COND_FALSE: u32 = 0;
    /// `Cond`'s true-branch projection number.
    pub const COND_TRUE: u32 = 1;
}

/// Attributes of a `Cmp` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CmpAttr {
    /// The relation tested.
    pub relation: Relation,
}

/// Attributes of a `Confirm` node: `relation(value, bound)` (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfirmAttr {
    /// The asserted relation between the confirmed value and its bound.
    pub relation: Relation,
}

/// One entry of a `Switch`'s jump table (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchEntry {
    /// Outgoing projection number for values in `[min, max]`.
    pub pn: u32,
    /// Inclusive range lower bound.
    pub min: i128,
    /// Inclusive range upper bound.
    pub max: i128,
}

/// Attributes of a `Switch` node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchAttr {
    /// The jump table. `pn == 0` is reserved for the default case.
    pub table: Vec<SwitchEntry>,
    /// Number of outgoing control-flow projections (`n_outs`), used to
    /// validate `pn < n_outs` (§3).
    pub n_outs: u32,
}

impl SwitchAttr {
    /// The default-case projection number.
    pub const DEFAULT_PN: u32 = 0;

    /// If this table contains exactly one entry that is itself a
    /// singleton value (`min == max`) other than the default, returns
    /// that value — used by Confirm insertion's switch-case rule
    /// (§4.8).
    pub fn singleton_case(&self, pn: u32) -> Option<i128> {
        let mut matches = self
            .table
            .iter()
            .filter(|entry| entry.pn == pn && entry.min == entry.max);
        let only = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(only.min)
    }
}

/// Attributes of a `Call` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallAttr {
    /// The (possibly already-lowered) method type this call targets.
    pub method_type: EntityRef,
}

/// Attributes of a `Builtin` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinAttr {
    /// Which builtin operation this node performs.
    pub kind: crate::op::Builtin,
}
