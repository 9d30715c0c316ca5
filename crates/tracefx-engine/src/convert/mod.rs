//! Frame conversion: the capability the optimize dispatcher consumes
//!
//! A [`FrameConverter`] looks at one pending [`Frame`] and either produces
//! [`GuardedCode`] to run in its place, declines (the frame runs
//! unmodified), or fails hard. The three outcomes are an explicit
//! [`Conversion`] value rather than error classes.

pub mod cache;
pub mod eager;

use std::sync::Arc;

use crate::backend::CompilerBackend;
use crate::error::ConvertError;
use crate::frame::{CodeObject, Frame, TypeTag};

pub use cache::CachingConverter;
pub use eager::EagerConverter;

/// Precondition under which replacement code is valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Valid for every frame of the converted code object
    Always,
    /// Valid only when the arguments have exactly these types
    ArgTypes(Vec<TypeTag>),
}

impl Guard {
    pub fn check(&self, frame: &Frame) -> bool {
        match self {
            Guard::Always => true,
            Guard::ArgTypes(expected) => {
                let args = frame.args();
                args.len() == expected.len()
                    && args.iter().zip(expected).all(|(v, t)| v.type_tag() == *t)
            }
        }
    }
}

/// Replacement code plus the guard that must hold to run it
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedCode {
    pub code: Arc<CodeObject>,
    pub guard: Guard,
}

impl GuardedCode {
    pub fn new(code: Arc<CodeObject>, guard: Guard) -> Self {
        GuardedCode { code, guard }
    }

    /// Whether this code may run in place of `frame`
    pub fn check(&self, frame: &Frame) -> bool {
        self.guard.check(frame)
    }
}

/// Result of offering a frame to a converter
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// Run this instead of the frame's own code
    Converted(GuardedCode),
    /// The converter cannot handle this frame; run it unmodified
    Declined(String),
    /// Conversion broke; the error reaches the caller
    Failed(ConvertError),
}

/// Produces replacement code for frames
pub trait FrameConverter: Send + Sync {
    fn convert(&self, frame: &Frame, backend: &dyn CompilerBackend) -> Conversion;
}

impl<F> FrameConverter for F
where
    F: Fn(&Frame, &dyn CompilerBackend) -> Conversion + Send + Sync,
{
    fn convert(&self, frame: &Frame, backend: &dyn CompilerBackend) -> Conversion {
        self(frame, backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Value;

    #[test]
    fn test_arg_type_guard() {
        let code = Arc::new(CodeObject::new("f", 2, 2, vec![]));
        let guard = Guard::ArgTypes(vec![TypeTag::Int, TypeTag::Float]);

        let ok = Frame::new(code.clone(), &[Value::Int(1), Value::Float(2.0)], 0);
        let bad = Frame::new(code.clone(), &[Value::Int(1), Value::Int(2)], 0);
        let short = Frame::new(code, &[Value::Int(1)], 0);

        assert!(guard.check(&ok));
        assert!(!guard.check(&bad));
        assert!(!guard.check(&short));
        assert!(Guard::Always.check(&bad));
    }
}
