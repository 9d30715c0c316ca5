//! Reference converter: hand the frame's whole body to the backend
//!
//! It does not trace or rewrite anything. It checks the body for
//! instructions it refuses to capture, passes the rest to the backend, and
//! guards the result on the argument types the frame arrived with.

use crate::backend::CompilerBackend;
use crate::convert::{Conversion, FrameConverter, Guard, GuardedCode};
use crate::frame::{instructions, Frame, Opcode};

/// Converter that compiles whole function bodies
#[derive(Debug, Clone)]
pub struct EagerConverter {
    unsupported: Vec<Opcode>,
}

impl EagerConverter {
    /// Decline bodies that contain calls (default)
    pub fn new() -> Self {
        EagerConverter {
            unsupported: vec![Opcode::Call],
        }
    }

    /// Decline bodies that contain any of `ops`
    pub fn with_unsupported(ops: impl IntoIterator<Item = Opcode>) -> Self {
        EagerConverter {
            unsupported: ops.into_iter().collect(),
        }
    }

    fn find_unsupported(&self, frame: &Frame) -> Option<(usize, Opcode)> {
        instructions(&frame.code.code)
            .find(|i| self.unsupported.contains(&i.opcode))
            .map(|i| (i.offset, i.opcode))
    }
}

impl Default for EagerConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameConverter for EagerConverter {
    fn convert(&self, frame: &Frame, backend: &dyn CompilerBackend) -> Conversion {
        if frame.code.code.is_empty() {
            return Conversion::Declined(format!("'{}' has an empty body", frame.name()));
        }
        if let Some((offset, op)) = self.find_unsupported(frame) {
            return Conversion::Declined(format!(
                "'{}': unsupported instruction '{}' at offset {}",
                frame.name(),
                op.name(),
                offset
            ));
        }

        match backend.compile(&frame.code) {
            Ok(code) => Conversion::Converted(GuardedCode::new(code, Guard::ArgTypes(frame.arg_types()))),
            Err(e) => Conversion::Failed(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{EagerBackend, StubBackend};
    use crate::error::{CompileError, ConvertError};
    use crate::frame::{CodeBuilder, CodeObject, TypeTag, Value};
    use std::sync::Arc;

    fn frame_with(code: Vec<u8>, args: &[Value]) -> Frame {
        Frame::new(Arc::new(CodeObject::new("f", args.len(), args.len(), code)), args, 0)
    }

    #[test]
    fn test_converts_straight_line_body() {
        let code = CodeBuilder::new()
            .load_local(0)
            .const_i64(1)
            .op(Opcode::Add)
            .op(Opcode::Return)
            .finish();
        let frame = frame_with(code, &[Value::Int(41)]);

        match EagerConverter::new().convert(&frame, &EagerBackend) {
            Conversion::Converted(unit) => {
                assert_eq!(unit.guard, Guard::ArgTypes(vec![TypeTag::Int]));
                assert!(unit.check(&frame));
            }
            other => panic!("expected conversion, got {:?}", other),
        }
    }

    #[test]
    fn test_declines_calls() {
        let code = CodeBuilder::new().call(0, 0).op(Opcode::Return).finish();
        let frame = frame_with(code, &[]);
        match EagerConverter::new().convert(&frame, &EagerBackend) {
            Conversion::Declined(reason) => assert!(reason.contains("call")),
            other => panic!("expected decline, got {:?}", other),
        }
    }

    #[test]
    fn test_declines_empty_body() {
        let frame = frame_with(vec![], &[]);
        assert!(matches!(
            EagerConverter::new().convert(&frame, &EagerBackend),
            Conversion::Declined(_)
        ));
    }

    #[test]
    fn test_custom_unsupported_set() {
        let code = CodeBuilder::new().const_i64(2).const_i64(3).op(Opcode::Mul).op(Opcode::Return).finish();
        let frame = frame_with(code, &[]);
        let converter = EagerConverter::with_unsupported([Opcode::Mul]);
        assert!(matches!(converter.convert(&frame, &EagerBackend), Conversion::Declined(_)));
    }

    #[test]
    fn test_backend_failure_is_fatal() {
        let code = CodeBuilder::new().const_i64(1).op(Opcode::Return).finish();
        let frame = frame_with(code, &[]);
        match EagerConverter::new().convert(&frame, &StubBackend) {
            Conversion::Failed(ConvertError::Backend(CompileError::Unsupported(_))) => {}
            other => panic!("expected backend failure, got {:?}", other),
        }
    }
}
