use thiserror::Error;

/// Result alias used throughout `firm-types`.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised while constructing or operating on modes, relations and
/// tarvals.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Two operands that should share a mode did not.
    #[error("mode mismatch: expected {expected}, found {found}")]
    ModeMismatch { expected: String, found: String },

    /// A mode definition violated one of the invariants in §3 (e.g. an
    /// integer mode with no signedness, or a modulo-shift that is neither
    /// zero nor the mode's bit width).
    #[error("invalid mode definition: {0}")]
    InvalidMode(String),

    /// A relation value used bits outside the defined lattice.
    #[error("invalid relation bits: {0:#08b}")]
    BadRelation(u8),

    /// A decimal string did not round-trip through the mode's arithmetic.
    #[error("failed to parse tarval {value:?} for mode {mode}")]
    ParseTarval { value: String, mode: String },

    /// An arithmetic family does not support the requested operation
    /// (e.g. a shift on a float mode, or a doubleword lowering rule
    /// applied to a non-two's-complement mode).
    #[error("unsupported arithmetic for mode {mode}: {reason}")]
    UnsupportedArithmetic { mode: String, reason: String },
}
