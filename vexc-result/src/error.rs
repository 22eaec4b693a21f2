use std::fmt;
use thiserror::Error;

/// Unified error type for all vexc compilation operations.
///
/// Each variant is recoverable at the query level: the engine can reject the
/// query or retry it with a different execution strategy.
#[derive(Error, Debug)]
pub enum Error {
    /// Arrow error while adapting columnar input for a compiled routine.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Invalid caller input, such as a column buffer set that does not match
    /// the routine's input columns.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// The expression contains a construct that this path cannot handle.
    ///
    /// Raised by SQL serialization for variants without a textual form and by
    /// code generation for variants that need runtime support not present in
    /// the generated routine.
    ///
    /// # Recovery
    ///
    /// Abandon pushdown, fall back to interpreted evaluation, or retry on CPU.
    #[error("Expression not supported yet: {0}")]
    Unsupported(String),

    /// Overflow or underflow while scaling a numeric or datetime value.
    #[error("{0}")]
    NumericOverflow(String),

    /// No registered runtime function overload matches a function call.
    #[error("extension function binding error: {0}")]
    ExtensionFunctionBinding(String),

    /// Lowering an expression into routine IR failed.
    #[error("codegen error: {0}")]
    Codegen(String),

    /// Native code generation for a device failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Internal error indicating a bug that is still safe to surface.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    #[inline]
    pub fn unsupported<E: fmt::Display>(what: E) -> Self {
        Error::Unsupported(what.to_string())
    }

    #[inline]
    pub fn codegen<E: fmt::Display>(err: E) -> Self {
        Error::Codegen(err.to_string())
    }

    #[inline]
    pub fn backend<E: fmt::Display>(err: E) -> Self {
        Error::Backend(err.to_string())
    }

    /// Whether the error asks the caller to fall back to another strategy
    /// rather than fail the query outright.
    pub fn is_fallback_candidate(&self) -> bool {
        matches!(self, Error::Unsupported(_) | Error::Backend(_))
    }
}
