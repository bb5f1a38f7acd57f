//! Error types produced by the Luna virtual machine.
//!
//! Every opcode handler, native function and allocator path returns
//! [`VmResult`]. The variants line up with the error kinds enumerated in
//! spec.md §7; `Internal` is reserved for invariant violations that indicate
//! a bug in the generator or VM itself rather than a user-visible runtime
//! fault.

use thiserror::Error;

/// Result type used throughout `luna-vm`.
pub type VmResult<T> = Result<T, VmError>;

/// A runtime error raised while executing a Luna program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Operator or call applied to incompatible operand types.
    #[error("TypeError: {message}")]
    Type { message: String },

    /// Wrong number of arguments passed to a function.
    #[error("ArityError: {name} expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Array subscript out of bounds, or a non-integer index.
    #[error("IndexError: {message}")]
    Index { message: String },

    /// Reference to an undeclared global.
    #[error("NameError: name '{name}' is not defined")]
    Name { name: String },

    /// Integer division or modulo by zero.
    #[error("Division by zero")]
    DivisionByZero,

    /// The activation-record stack (call depth) is exhausted.
    #[error("Stack overflow: maximum call stack reached")]
    StackOverflow,

    /// A user-raised error via the `raise` builtin.
    #[error("{message}")]
    Runtime { message: String },

    /// A generator/VM invariant was violated; indicates a bug, not user error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl VmError {
    pub fn type_error(message: impl Into<String>) -> Self {
        VmError::Type {
            message: message.into(),
        }
    }

    pub fn type_mismatch(op: &str, lhs: &str, rhs: &str) -> Self {
        VmError::Type {
            message: format!("unsupported operand types for {op}: '{lhs}' and '{rhs}'"),
        }
    }

    pub fn arity(name: impl Into<String>, expected: usize, actual: usize) -> Self {
        VmError::Arity {
            name: name.into(),
            expected,
            actual,
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        VmError::Index {
            message: message.into(),
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        VmError::Name { name: name.into() }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        VmError::Runtime {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        VmError::Internal {
            message: message.into(),
        }
    }

    /// The error-kind label used in `Error: <kind>` reports (spec.md §7).
    pub fn kind_label(&self) -> &'static str {
        match self {
            VmError::Type { .. } => "TypeError",
            VmError::Arity { .. } => "ArityError",
            VmError::Index { .. } => "IndexError",
            VmError::Name { .. } => "NameError",
            VmError::DivisionByZero => "DivisionByZero",
            VmError::StackOverflow => "StackOverflow",
            VmError::Runtime { .. } => "RuntimeError",
            VmError::Internal { .. } => "InternalError",
        }
    }
}
