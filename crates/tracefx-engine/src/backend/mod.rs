//! Compiler backends carried by the optimize dispatcher

pub mod traits;
pub mod eager;
pub mod stub;

use std::sync::Arc;

pub use traits::CompilerBackend;
pub use eager::EagerBackend;
pub use stub::StubBackend;

/// The backend used when a caller does not supply one
pub fn default_backend() -> Arc<dyn CompilerBackend> {
    Arc::new(EagerBackend)
}
