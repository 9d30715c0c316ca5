//! Stub backend for exercising failure paths without real codegen

use std::sync::Arc;

use super::traits::CompilerBackend;
use crate::error::CompileError;
use crate::frame::CodeObject;

/// A backend that refuses every body
#[derive(Debug, Default, Clone, Copy)]
pub struct StubBackend;

impl CompilerBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn compile(&self, graph: &Arc<CodeObject>) -> Result<Arc<CodeObject>, CompileError> {
        Err(CompileError::Unsupported(format!(
            "stub backend cannot compile '{}'",
            graph.name
        )))
    }
}
