//! Default backend: run the captured body as-is

use std::sync::Arc;

use super::traits::CompilerBackend;
use crate::error::CompileError;
use crate::frame::{instructions, CodeObject};

/// Backend that returns the captured body unchanged.
///
/// Logs what it was given, so the effect of interception is observable
/// without a real code generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct EagerBackend;

impl CompilerBackend for EagerBackend {
    fn name(&self) -> &str {
        "eager"
    }

    fn compile(&self, graph: &Arc<CodeObject>) -> Result<Arc<CodeObject>, CompileError> {
        log::debug!(
            target: "tracefx::backend",
            "eager backend: '{}' ({} instructions, {} bytes)",
            graph.name,
            instructions(&graph.code).count(),
            graph.code.len()
        );
        Ok(graph.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CodeBuilder, Opcode};

    #[test]
    fn test_eager_returns_same_body() {
        let code = CodeBuilder::new().const_i64(1).op(Opcode::Return).finish();
        let graph = Arc::new(CodeObject::new("one", 0, 0, code));
        let compiled = EagerBackend.compile(&graph).unwrap();
        assert!(Arc::ptr_eq(&graph, &compiled));
        assert_eq!(EagerBackend.name(), "eager");
    }
}
