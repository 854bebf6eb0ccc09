//! The node opcode set — the discriminator every IR node carries (§3).

use strum::{Display, EnumIter, EnumString};

/// Reduction/bit-twiddling builtins lowered specially by double-word
/// lowering (§4.10, "Builtin lowering").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Builtin {
    /// Find-first-set.
    Ffs,
    /// Count leading zeros.
    Clz,
    /// Count trailing zeros.
    Ctz,
    /// Population count.
    Popcount,
    /// Parity (popcount mod 2).
    Parity,
    /// Byte swap.
    Bswap,
    /// Trap / debug break.
    Trap,
    /// Current frame address.
    FrameAddress,
    /// Caller return address.
    ReturnAddress,
    /// Cache prefetch hint.
    Prefetch,
    /// Port input (embedded targets).
    InPort,
    /// Port output (embedded targets).
    OutPort,
    /// Indirect-call trampoline setup.
    Trampoline,
}

impl Builtin {
    /// Builtins that double-word lowering decomposes into word-size
    /// halves combined by Mux/add/xor (§4.10): `ffs`, `clz`, `ctz`,
    /// `popcount`, `parity`, and `bswap`. The remainder (`trap`,
    /// `frame_address`, `return_address`, `prefetch`, `in_port`,
    /// `out_port`, `trampoline`) is left untouched.
    pub fn is_doubleword_reducible(self) -> bool {
        matches!(
            self,
            Builtin::Ffs
                | Builtin::Clz
                | Builtin::Ctz
                | Builtin::Popcount
                | Builtin::Parity
                | Builtin::Bswap
        )
    }
}

/// The closed set of node opcodes.
///
/// Mirrors `fuel_asm::Opcode`'s shape (a flat, exhaustively-matched enum
/// that is the dispatch key for every per-node table: verification,
/// dumping, transformation handlers) but sized to the operations this
/// core actually needs rather than a target instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Op {
    // --- control / structure ---
    /// Graph entry; produces the initial control/memory/args tuple.
    Start,
    /// Graph exit; collects all live return/exception paths.
    End,
    /// A control-flow region; inputs are control-flow predecessors.
    Block,
    /// Unconditional jump.
    Jmp,
    /// Two-way conditional branch over a boolean selector.
    Cond,
    /// Multi-way branch over an integer selector.
    Switch,
    /// Extracts one component of a tuple-producing node.
    Proj,
    /// Control-flow merge selecting one of per-predecessor inputs.
    Phi,
    /// Function return.
    Return,
    /// A placeholder for an unreachable/invalid value.
    Bad,
    /// The distinguished "no side effect yet" memory value.
    NoMem,
    /// A not-yet-known value, used during incremental construction.
    Unknown,
    /// Carries a graph's distinguished roots (start/end/frame/args/mem).
    Anchor,
    /// Temporary placeholder used while lowering Phis (§4.10).
    Dummy,
    /// A rewrite placeholder that is transparently skipped on read
    /// (§4.1: "Identity nodes may be used as rewrite placeholders;
    /// reads transparently skip through them").
    Id,

    // --- values ---
    /// A mode-tagged constant.
    Const,
    /// The (possibly lowered-later) address of an entity.
    SymConst,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Eor,
    Not,
    Neg,
    Shl,
    Shr,
    Shrs,
    Rotl,
    /// Mode conversion (truncation, extension, int↔float).
    Conv,
    /// Comparison producing a boolean tagged with a [`firm_types::Relation`].
    Cmp,
    /// Value-select: `cond ? t : f`.
    Mux,
    /// A dominance-derived value refinement (§4.8).
    Confirm,

    // --- memory / calls ---
    Load,
    Store,
    Call,
    /// A builtin operation (§4.10).
    Builtin,
}

impl Op {
    /// `true` for nodes whose result mode is always `T` (tuple),
    /// requiring `Proj` to extract components — used by the verifier's
    /// "Proj's predecessor has mode T" check (§4.7).
    pub fn produces_tuple(self) -> bool {
        matches!(
            self,
            Op::Start | Op::Call | Op::Load | Op::Store | Op::Div | Op::Mod | Op::Switch
        )
    }

    /// `true` for nodes that are control-flow-producing (have a `Proj`
    /// of mode `X` among their results, or are themselves mode `X`).
    pub fn is_cfg(self) -> bool {
        matches!(
            self,
            Op::Start | Op::Block | Op::Jmp | Op::Cond | Op::Switch | Op::Return | Op::End
        )
    }
}
