//! Frame hook installation and scoping
//!
//! - [`registry`]: the single-slot [`HookRegistry`] and the [`Callback`] it holds
//! - [`scope`]: [`InterceptionScope`], its RAII [`ScopeGuard`] and the
//!   [`Intercepted`] function wrapper
//! - [`DisabledScope`] / [`disable`]: scopes that suppress interception

pub mod registry;
pub mod scope;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

pub use registry::{global, Callback, FrameHook, HookRegistry, SharedRegistry, ThreadRegistry};
pub use scope::{Intercepted, InterceptionScope, ScopeGuard};

/// An [`InterceptionScope`] that installs [`Callback::Null`]
///
/// No frame is intercepted while it is open, whatever was active before.
/// The frame evaluator opens one around every callback invocation so the
/// converter never intercepts its own execution.
#[derive(Debug)]
pub struct DisabledScope(InterceptionScope);

impl DisabledScope {
    pub fn new(registry: Arc<dyn HookRegistry>) -> Self {
        DisabledScope(InterceptionScope::with_registry(Callback::Null, registry))
    }
}

impl Default for DisabledScope {
    fn default() -> Self {
        Self::new(global())
    }
}

impl Deref for DisabledScope {
    type Target = InterceptionScope;

    fn deref(&self) -> &InterceptionScope {
        &self.0
    }
}

impl DerefMut for DisabledScope {
    fn deref_mut(&mut self) -> &mut InterceptionScope {
        &mut self.0
    }
}

/// A disabled scope over the process-wide registry, for block use
pub fn disabled() -> DisabledScope {
    DisabledScope::default()
}

/// Wrap `f` so it always runs with interception suppressed
pub fn disable<F>(f: F) -> Intercepted<F> {
    disabled().wrap(f)
}
