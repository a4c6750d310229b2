/**
Error types for the Stoat compiler

Every failure the front end or the verifier can raise is an `ErrorKind`
paired with the `SourceLoc` of the token that caused it. Compilation is
fail-fast: the first error aborts the pipeline and nothing is emitted.
*/

use crate::ast::SourceLoc;
use thiserror::Error;

/// A compile error anchored at a source location
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{location}: error: {kind}")]
pub struct Error {
    pub location: SourceLoc,
    pub kind: ErrorKind,
}

/// What went wrong
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// An operation needs more stack items than are available
    #[error("stack underflow in `{op}`: requires {required} item(s), {available} available")]
    StackUnderflow {
        op: String,
        required: usize,
        available: usize,
    },

    /// An operand has the wrong type (includes pointer vs non-pointer)
    #[error("type mismatch in `{op}`: expected {expected}, found {found}")]
    TypeMismatch {
        op: String,
        expected: String,
        found: String,
    },

    /// A conditional arm net-changes the stack, or two arms disagree
    #[error("{message}\n{report}")]
    BranchShapeViolation { message: String, report: String },

    /// A loop condition or body net-changes the stack
    #[error("{message}\n{report}")]
    LoopShapeViolation { message: String, report: String },

    /// A name is defined twice
    #[error("`{name}` is already defined at {previous}")]
    DuplicateDefinition { name: String, previous: SourceLoc },

    /// A word that is neither a builtin nor a definition nor a pin
    #[error("unresolved identifier `{name}`")]
    UnresolvedIdentifier { name: String },

    /// A function body does not produce its declared outputs
    #[error("`{function}` does not honor its contract: expected {expected}, body leaves {found}\n{report}")]
    ContractViolation {
        function: String,
        expected: String,
        found: String,
        report: String,
    },

    /// Structural syntax error, usually a missing closing token
    #[error("malformed syntax: {message}")]
    MalformedSyntax { message: String },

    /// The program pins more words than the scratch buffer holds
    #[error("pinning `{name}` needs {requested} more word(s) but pin storage holds {capacity}")]
    PinStorageExhausted {
        name: String,
        requested: usize,
        capacity: usize,
    },
}

impl ErrorKind {
    /// Anchor this error at a source location
    pub fn at(self, location: &SourceLoc) -> Error {
        Error {
            location: location.clone(),
            kind: self,
        }
    }

    pub fn type_mismatch(op: &str, expected: impl ToString, found: impl ToString) -> Self {
        ErrorKind::TypeMismatch {
            op: op.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ErrorKind::MalformedSyntax {
            message: message.into(),
        }
    }
}

/// Result type used throughout the compiler
pub type Result<T> = std::result::Result<T, Error>;
