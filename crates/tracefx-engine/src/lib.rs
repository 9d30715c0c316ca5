//! Tracefx Engine
//!
//! Call interception control plane for a trace-and-compile system:
//! - **Hook**: the single-slot callback registry, interception scopes,
//!   function wrapping and disable scopes (`hook` module)
//! - **Dispatch**: the optimize dispatcher that turns a converter and a
//!   compiler backend into a frame callback (`dispatch` module)
//! - **Convert / Backend**: the converter and backend capabilities the
//!   dispatcher consumes, with reference implementations
//! - **Interp**: a frame evaluator that consults the hook before every frame
//!
//! # Example
//!
//! ```rust,ignore
//! use tracefx_engine::{optimize_fn, EagerBackend, Interpreter};
//!
//! let interp = Interpreter::new(program);
//! let run = optimize_fn(|n: i64| interp.call(main, &[n.into()]), Arc::new(EagerBackend));
//! let result = run.call(10)?;
//! ```

#![warn(rust_2018_idioms)]

/// Error types
pub mod error;

/// Dispatcher configuration
pub mod config;

/// Call frames, code objects and bytecode
pub mod frame;

/// Hook registry and interception scopes
pub mod hook;

/// Frame converters and guarded replacement code
pub mod convert;

/// Compiler backends
pub mod backend;

/// Optimize dispatcher and entry points
pub mod dispatch;

/// Dispatch counters
pub mod profiling;

/// Reference frame evaluator
pub mod interp;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{default_backend, CompilerBackend, EagerBackend, StubBackend};
pub use config::DispatchConfig;
pub use convert::{CachingConverter, Conversion, EagerConverter, FrameConverter, Guard, GuardedCode};
pub use dispatch::{default_converter, optimize, optimize_fn, DispatchOutcome, OptimizeDispatcher};
pub use error::{CompileError, ConvertError, HookError, InterpError, ScopeError};
pub use frame::{CodeBuilder, CodeId, CodeObject, Frame, Opcode, Program, TypeTag, Value};
pub use hook::{
    disable, disabled, global, Callback, DisabledScope, HookRegistry, Intercepted, InterceptionScope,
    ScopeGuard, SharedRegistry, ThreadRegistry,
};
pub use interp::{ExecStats, Interpreter};
pub use profiling::{DispatchSnapshot, DispatchStats};
