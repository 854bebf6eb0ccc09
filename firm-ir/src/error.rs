//! Error types (§7).

use crate::graph::NodeId;

/// Result alias used throughout `firm-ir`.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// A verifier-detected structural or mode error (§4.7, §7).
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "{cause}")]
pub struct VerifyFailure {
    /// The offending node.
    pub node: NodeId,
    /// The offending predecessor, if the failure concerns an input.
    pub predecessor: Option<NodeId>,
    /// Human-readable cause.
    pub cause: String,
}

/// Errors raised by the graph kernel, passes, and the textual format
/// reader/writer (§7).
#[derive(Debug, derive_more::Display)]
pub enum Error {
    /// An input position outside `[-1, arity)` was requested.
    #[display(fmt = "input index {index} out of range for node {node} (arity {arity})")]
    BadInputIndex {
        /// The node that was indexed.
        node: NodeId,
        /// The offending index.
        index: i32,
        /// That node's arity.
        arity: usize,
    },

    /// The verifier found one or more structural/mode violations.
    #[display(fmt = "verification failed with {} failure(s)", "failures.len()")]
    VerifyFailed {
        /// Every failure collected (one, unless the `Collect` strategy
        /// was used).
        failures: Vec<VerifyFailure>,
    },

    /// A pass's declared required property did not hold and could not
    /// be (re)computed.
    #[display(fmt = "pass {pass} requires property {missing:?}, which is unavailable")]
    PreconditionViolation {
        /// The pass that failed its precondition.
        pass: &'static str,
        /// The missing property, described for diagnostics.
        missing: String,
    },

    /// Two passes contended for the same scratch/link resource (§5).
    #[display(fmt = "resource collision on slot {slot:?}")]
    ResourceCollision {
        /// The contended resource kind.
        slot: crate::pass::ResourceKind,
    },

    /// A construct that is fatal to handle (§4.10, §7): a doubleword
    /// operation on a non-two's-complement mode, a modulo-shift that
    /// contradicts the word-halving assumption, or similar.
    #[display(fmt = "unsupported construct: {reason}")]
    UnsupportedConstruct {
        /// Why the construct is unsupported.
        reason: String,
    },

    /// A textual-IR parse error (§6, §7): reported with file/line/context;
    /// the reader recovers by skipping to the next newline.
    #[display(fmt = "{file}:{line}: {message}")]
    Parse {
        /// Source file name (or `"<input>"` if unknown).
        file: String,
        /// 1-based line number.
        line: u32,
        /// Human-readable message.
        message: String,
    },

    /// A mode-system error bubbled up from `firm-types`.
    #[display(fmt = "{_0}")]
    Mode(firm_types::Error),
}

impl std::error::Error for Error {}

impl From<firm_types::Error> for Error {
    fn from(value: firm_types::Error) -> Self {
        Error::Mode(value)
    }
}
