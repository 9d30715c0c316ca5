//! Compiler backend trait
//!
//! The dispatcher never looks inside a backend; it only carries one to the
//! frame converter. Converters hand the backend a captured body and get back
//! the code to run in the frame's place.

use std::sync::Arc;

use crate::error::CompileError;
use crate::frame::CodeObject;

/// Turns a captured function body into replacement code
pub trait CompilerBackend: Send + Sync {
    /// Backend name (for diagnostics)
    fn name(&self) -> &str;

    /// Compile a captured body into the code object that runs instead
    fn compile(&self, graph: &Arc<CodeObject>) -> Result<Arc<CodeObject>, CompileError>;
}
