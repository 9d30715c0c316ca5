//! Error taxonomy for the interception control plane
//!
//! Recoverable "declined" conversions are not errors: they are a variant of
//! [`Conversion`](crate::convert::Conversion). Everything in this module is a
//! hard failure that the caller sees.

use crate::frame::TypeTag;

/// Error raised by a compiler backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("Unsupported by backend: {0}")]
    Unsupported(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Non-recoverable failure while converting a frame
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConvertError {
    #[error("Compilation failed: {0}")]
    Backend(#[from] CompileError),
    #[error("Converter error: {0}")]
    Internal(String),
}

/// Error returned by an active frame callback
///
/// Wraps the converter failure verbatim.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HookError {
    #[error("Frame conversion failed: {0}")]
    Conversion(#[from] ConvertError),
}

/// Misuse of a manually driven [`InterceptionScope`](crate::hook::InterceptionScope)
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("Scope is already active; open a new scope for each nesting level")]
    AlreadyActive,
    #[error("Scope is not active")]
    NotActive,
}

/// Error during frame evaluation in the reference interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpError {
    #[error("Operand stack underflow at offset {0}")]
    StackUnderflow(usize),
    #[error("Invalid opcode 0x{0:02X}")]
    InvalidOpcode(u8),
    #[error("Truncated operand at offset {0}")]
    TruncatedOperand(usize),
    #[error("Jump target {0} out of bounds")]
    InvalidJump(i64),
    #[error("Local slot {0} out of range")]
    InvalidLocal(u16),
    #[error("Type mismatch: cannot apply {op} to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: TypeTag,
        right: TypeTag,
    },
    #[error("Unknown function index {0}")]
    UnknownFunction(u32),
    #[error("Function '{name}' expects {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("Maximum call depth ({0}) exceeded")]
    RecursionLimit(usize),
    #[error("Function '{0}' ended without returning")]
    MissingReturn(String),
    #[error(transparent)]
    Hook(#[from] HookError),
}
