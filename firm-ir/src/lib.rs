//! A Sea-of-Nodes SSA graph kernel: nodes and def-use edges, dominance
//! and loop analyses, a property-driven pass manager, a structural
//! verifier, Confirm insertion, a generic transformation framework,
//! double-word lowering, and read/write and write-only external text
//! formats.
//!
//! Layered the way `fuel_vm` sits on `fuel_asm`/`fuel_types`: this
//! crate is the engine, `firm-asm` is the instruction set (opcodes and
//! their attribute payloads), and `firm-types` is the value layer
//! (modes, relations, tarvals) both of the above share.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod dominance;
pub mod error;
pub mod format;
pub mod graph;
pub mod ident;
pub mod lower;
pub mod pass;
pub mod passes;
pub mod properties;
pub mod transform;
pub mod ty;
pub mod verify;
pub mod walk;

pub use dominance::{compute_dominance, compute_post_dominance, compute_loop_info, DominanceInfo, Loop, LoopInfo};
pub use error::{Error, Result, VerifyFailure};
pub use ident::{Ident, IdentTable};
pub use pass::{ensure, run_pass, Pass, ResourceKind};
pub use properties::Properties;
pub use transform::{transform_graph, Correspondence, Handler, HandlerTable};
pub use ty::{CallingConvention, Entity, EntityId, EntityKind, Field, MethodType, Type, TypeId, TypeTable};
pub use verify::{verify, verify_with_types, Collect, Normal, VerifyStrategy};

#[doc(no_inline)]
pub use firm_asm;
#[doc(no_inline)]
pub use firm_types;

/// Re-exports intended for glob-importing call sites, mirroring
/// `fuel_vm::prelude`.
pub mod prelude {
    #[doc(no_inline)]
    pub use crate::dominance::{DominanceInfo, Loop, LoopInfo};
    #[doc(no_inline)]
    pub use crate::error::{Error, Result, VerifyFailure};
    #[doc(no_inline)]
    pub use crate::format::{dump_graph, read_graph, write_graph, ReadOutcome};
    #[doc(no_inline)]
    pub use crate::graph::{Attr, Builder, Graph, NodeId};
    #[doc(no_inline)]
    pub use crate::ident::{Ident, IdentTable};
    #[doc(no_inline)]
    pub use crate::pass::{ensure, run_pass, Pass, ResourceKind};
    #[doc(no_inline)]
    pub use crate::properties::Properties;
    #[doc(no_inline)]
    pub use crate::transform::{transform_graph, Correspondence, HandlerTable};
    #[doc(no_inline)]
    pub use crate::ty::{Entity, EntityId, Type, TypeId, TypeTable};
    #[doc(no_inline)]
    pub use crate::verify::{verify, verify_with_types, Normal, VerifyStrategy};
    #[doc(no_inline)]
    pub use firm_asm::Op;
    #[doc(no_inline)]
    pub use firm_types::{Mode, Relation, Tarval};
}
