//! Call frames: the unit of work the interception hook sees
//!
//! A [`Frame`] is one pending function invocation: the code object about to
//! run plus its locals (arguments first). Frames are what the active
//! [`Callback`](crate::hook::Callback) receives.

pub mod opcode;
mod value;

pub use opcode::{instructions, CodeBuilder, Instr, Opcode};
pub use value::{TypeTag, Value};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a code object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeId(u64);

impl CodeId {
    fn next() -> Self {
        CodeId(NEXT_CODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Immutable compiled function body
#[derive(Debug, Clone, PartialEq)]
pub struct CodeObject {
    pub id: CodeId,
    pub name: String,
    pub param_count: usize,
    /// Total local slots, parameters included
    pub local_count: usize,
    pub code: Vec<u8>,
}

impl CodeObject {
    /// Create a code object with a fresh [`CodeId`].
    ///
    /// `local_count` is raised to `param_count` if smaller.
    pub fn new(name: impl Into<String>, param_count: usize, local_count: usize, code: Vec<u8>) -> Self {
        CodeObject {
            id: CodeId::next(),
            name: name.into(),
            param_count,
            local_count: local_count.max(param_count),
            code,
        }
    }

    /// Whether any instruction in the body uses `op`
    pub fn uses(&self, op: Opcode) -> bool {
        instructions(&self.code).any(|i| i.opcode == op)
    }
}

/// A pending function invocation
#[derive(Debug, Clone)]
pub struct Frame {
    pub code: Arc<CodeObject>,
    pub locals: Vec<Value>,
    /// Call depth (0 for the outermost frame)
    pub depth: usize,
}

impl Frame {
    /// Build a frame, placing `args` in the first local slots and padding
    /// the rest with `Null`.
    pub fn new(code: Arc<CodeObject>, args: &[Value], depth: usize) -> Self {
        let mut locals = Vec::with_capacity(code.local_count.max(args.len()));
        locals.extend_from_slice(args);
        locals.resize(code.local_count.max(args.len()), Value::Null);
        Frame { code, locals, depth }
    }

    /// The argument values this frame was entered with
    pub fn args(&self) -> &[Value] {
        let n = self.code.param_count.min(self.locals.len());
        &self.locals[..n]
    }

    pub fn arg_types(&self) -> Vec<TypeTag> {
        self.args().iter().map(Value::type_tag).collect()
    }

    pub fn name(&self) -> &str {
        &self.code.name
    }
}

/// A set of functions addressable by index from `Call` instructions
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: Vec<Arc<CodeObject>>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function, returning its index
    pub fn add(&mut self, code: CodeObject) -> u32 {
        self.functions.push(Arc::new(code));
        (self.functions.len() - 1) as u32
    }

    pub fn function(&self, idx: u32) -> Option<&Arc<CodeObject>> {
        self.functions.get(idx as usize)
    }
}
