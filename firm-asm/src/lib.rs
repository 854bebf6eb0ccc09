//! Opcode and per-opcode attribute definitions for the firm SSA IR core.
//!
//! This crate is the "instruction set" layer: it defines *what kinds* of
//! nodes exist and what data each kind carries, without any notion of a
//! graph, inputs, or def-use edges — those live in `firm-ir`. The split
//! mirrors `fuel-asm` (the opcode/encoding crate) sitting underneath
//! `fuel-vm` (the execution engine).

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod attrs;
pub mod op;

pub use attrs::{
    BuiltinAttr, CallAttr, CmpAttr, ConfirmAttr, ConstAttr, EntityRef, ProjAttr, SwitchAttr,
    SwitchEntry, SymConstAttr,
};
pub use op::{Builtin, Op};
