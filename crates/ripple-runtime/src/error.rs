//! Runtime errors.

use thiserror::Error;

/// Runtime result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure inside a single formula evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("index out of range: {0}")]
    IndexOutOfRange(String),

    #[error("{0}")]
    Io(String),
}

/// Errors surfaced by the engine API.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown node `{0}`")]
    UnknownNode(String),

    #[error("`{0}` is not a source")]
    NotASource(String),

    #[error("`{0}` is not a sink")]
    NotASink(String),

    #[error("pushed value for `{source_name}` does not match declared type `{expected}`")]
    PushTypeMismatch {
        source_name: String,
        expected: &'static str,
    },

    #[error("evaluating `{node}`: {error}")]
    Eval { node: String, error: EvalError },

    #[error("step budget of {0} exceeded; wave rolled back")]
    StepBudgetExceeded(usize),
}

impl Error {
    pub(crate) fn eval(node: impl Into<String>, error: EvalError) -> Self {
        Error::Eval {
            node: node.into(),
            error,
        }
    }
}
