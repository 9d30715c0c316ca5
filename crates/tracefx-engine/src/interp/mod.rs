//! Reference frame evaluator
//!
//! A small stack interpreter that consults a [`HookRegistry`] before running
//! every frame, the way a host interpreter with a frame-evaluation hook does:
//!
//! 1. read the active callback,
//! 2. if one is active, offer it the frame with interception disabled (so a
//!    converter that evaluates code never intercepts itself),
//! 3. run the replacement code if the callback returned one and its guard
//!    holds, otherwise run the frame's own code.
//!
//! Nested `Call` instructions build new frames that go through the same
//! path, so every call depth is intercepted independently.

mod exec;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::dispatch::DispatchOutcome;
use crate::error::InterpError;
use crate::frame::{Frame, Program, Value};
use crate::hook::{global, DisabledScope, HookRegistry};

/// Default maximum call depth
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Frame evaluation counters
#[derive(Debug, Default)]
struct ExecCounters {
    frames: AtomicU64,
    replaced: AtomicU64,
    guard_failures: AtomicU64,
}

/// Point-in-time copy of the evaluator's counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecStats {
    /// Frames evaluated
    pub frames: u64,
    /// Frames that ran replacement code
    pub replaced: u64,
    /// Replacement code returned by the hook but rejected by its guard
    pub guard_failures: u64,
}

/// Evaluates frames of a [`Program`], offering each to the active hook
pub struct Interpreter {
    program: Arc<Program>,
    registry: Arc<dyn HookRegistry>,
    max_depth: usize,
    counters: ExecCounters,
}

impl Interpreter {
    /// Interpreter over the process-wide registry
    pub fn new(program: impl Into<Arc<Program>>) -> Self {
        Self::with_registry(program, global())
    }

    pub fn with_registry(program: impl Into<Arc<Program>>, registry: Arc<dyn HookRegistry>) -> Self {
        Interpreter {
            program: program.into(),
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
            counters: ExecCounters::default(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn stats(&self) -> ExecStats {
        ExecStats {
            frames: self.counters.frames.load(Ordering::Relaxed),
            replaced: self.counters.replaced.load(Ordering::Relaxed),
            guard_failures: self.counters.guard_failures.load(Ordering::Relaxed),
        }
    }

    /// Call function `func` with `args` as the outermost frame
    pub fn call(&self, func: u32, args: &[Value]) -> Result<Value, InterpError> {
        self.call_at(func, args, 0)
    }

    fn call_at(&self, func: u32, args: &[Value], depth: usize) -> Result<Value, InterpError> {
        let code = self
            .program
            .function(func)
            .ok_or(InterpError::UnknownFunction(func))?;
        if args.len() != code.param_count {
            return Err(InterpError::ArityMismatch {
                name: code.name.clone(),
                expected: code.param_count,
                got: args.len(),
            });
        }
        self.eval_frame(Frame::new(code.clone(), args, depth))
    }

    /// Evaluate one frame, giving the active callback a chance to replace it
    pub fn eval_frame(&self, frame: Frame) -> Result<Value, InterpError> {
        if frame.depth >= self.max_depth {
            return Err(InterpError::RecursionLimit(self.max_depth));
        }
        self.counters.frames.fetch_add(1, Ordering::Relaxed);

        let callback = self.registry.current();
        let outcome = if callback.is_null() {
            DispatchOutcome::Fallback
        } else {
            let disabled = DisabledScope::new(self.registry.clone());
            let _guard = disabled.activate();
            callback.invoke(&frame)?
        };

        let code = match outcome {
            DispatchOutcome::Replace(unit) if unit.check(&frame) => {
                self.counters.replaced.fetch_add(1, Ordering::Relaxed);
                unit.code
            }
            DispatchOutcome::Replace(_) => {
                self.counters.guard_failures.fetch_add(1, Ordering::Relaxed);
                log::trace!(target: "tracefx::interp", "guard failed for '{}'", frame.name());
                frame.code.clone()
            }
            DispatchOutcome::Fallback => frame.code.clone(),
        };

        let Frame { mut locals, depth, .. } = frame;
        if locals.len() < code.local_count {
            locals.resize(code.local_count, Value::Null);
        }
        self.execute(&code, &mut locals, depth)
    }
}
