//! Interception scopes
//!
//! An [`InterceptionScope`] pairs a callback with a registry. Opening the
//! scope installs the callback and remembers what it displaced; closing it
//! puts that value back. Three ways to open one:
//!
//! - `enter()` / `exit()` for manual control,
//! - [`InterceptionScope::activate`], which returns a [`ScopeGuard`] that
//!   restores on drop (including unwinding),
//! - [`InterceptionScope::wrap`], which produces an [`Intercepted`] function
//!   that opens a fresh guard around every call.
//!
//! Scopes nest as a stack: each one restores exactly the callback it
//! displaced, so closing them in reverse order walks the registry back
//! through every earlier state.

use std::fmt;
use std::sync::Arc;

use crate::error::ScopeError;
use crate::hook::registry::{global, Callback, HookRegistry};

/// RAII restoration of a displaced callback
///
/// Created by [`InterceptionScope::activate`] and by every
/// [`Intercepted::call`]. Dropping it reinstalls the callback that was
/// active when it was created.
#[must_use = "the callback is restored as soon as the guard is dropped"]
pub struct ScopeGuard<'a> {
    registry: &'a dyn HookRegistry,
    previous: Option<Callback>,
}

impl<'a> ScopeGuard<'a> {
    fn install(registry: &'a dyn HookRegistry, callback: Callback) -> Self {
        let previous = registry.install(callback);
        log::trace!(target: "tracefx::hook", "scope opened, displaced {:?}", previous);
        ScopeGuard {
            registry,
            previous: Some(previous),
        }
    }

    /// The callback this guard will restore
    pub fn previous(&self) -> Option<&Callback> {
        self.previous.as_ref()
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            log::trace!(target: "tracefx::hook", "scope closed, restoring {:?}", previous);
            self.registry.install(previous);
        }
    }
}

/// A callback bound to a registry, installable for a dynamic extent
pub struct InterceptionScope {
    registry: Arc<dyn HookRegistry>,
    callback: Callback,
    /// Displaced callback; `Some` exactly while entered via `enter()`
    previous: Option<Callback>,
}

impl InterceptionScope {
    /// Scope over the process-wide registry
    pub fn new(callback: Callback) -> Self {
        Self::with_registry(callback, global())
    }

    /// Scope over an injected registry
    pub fn with_registry(callback: Callback, registry: Arc<dyn HookRegistry>) -> Self {
        InterceptionScope {
            registry,
            callback,
            previous: None,
        }
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    pub fn registry(&self) -> &Arc<dyn HookRegistry> {
        &self.registry
    }

    /// Whether `enter()` has been called without a matching `exit()`
    pub fn is_active(&self) -> bool {
        self.previous.is_some()
    }

    /// Install this scope's callback, remembering the displaced one.
    ///
    /// A scope instance is either idle or active. Re-entering an active
    /// instance is rejected; nested interception needs its own scope.
    pub fn enter(&mut self) -> Result<(), ScopeError> {
        if self.previous.is_some() {
            return Err(ScopeError::AlreadyActive);
        }
        let previous = self.registry.install(self.callback.clone());
        log::trace!(target: "tracefx::hook", "scope entered, displaced {:?}", previous);
        self.previous = Some(previous);
        Ok(())
    }

    /// Restore the callback displaced by the matching `enter()`
    pub fn exit(&mut self) -> Result<(), ScopeError> {
        let previous = self.previous.take().ok_or(ScopeError::NotActive)?;
        log::trace!(target: "tracefx::hook", "scope exited, restoring {:?}", previous);
        self.registry.install(previous);
        Ok(())
    }

    /// Install the callback until the returned guard is dropped.
    ///
    /// Independent of `enter()`/`exit()`: every guard captures its own
    /// displaced callback, so one scope can be activated at several nesting
    /// levels at once.
    pub fn activate(&self) -> ScopeGuard<'_> {
        ScopeGuard::install(&*self.registry, self.callback.clone())
    }

    /// Run `f` with the callback installed
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.activate();
        f()
    }

    /// Wrap `f` so that every call runs inside this scope
    pub fn wrap<F>(&self, f: F) -> Intercepted<F> {
        Intercepted {
            registry: self.registry.clone(),
            callback: self.callback.clone(),
            inner: f,
        }
    }
}

impl Drop for InterceptionScope {
    fn drop(&mut self) {
        // Entered but never exited: restore anyway
        if self.previous.is_some() {
            log::warn!(target: "tracefx::hook", "interception scope dropped while active");
            let _ = self.exit();
        }
    }
}

impl fmt::Debug for InterceptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionScope")
            .field("callback", &self.callback)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A function whose every invocation runs inside an interception scope
///
/// Multi-argument functions take their arguments as a tuple.
pub struct Intercepted<F> {
    registry: Arc<dyn HookRegistry>,
    callback: Callback,
    inner: F,
}

impl<F> Intercepted<F> {
    /// Call the wrapped function with the callback installed.
    ///
    /// The displaced callback is restored before the result (or a panic)
    /// reaches the caller.
    pub fn call<A, T>(&self, args: A) -> T
    where
        F: Fn(A) -> T,
    {
        let _guard = ScopeGuard::install(&*self.registry, self.callback.clone());
        (self.inner)(args)
    }

    /// The original, uninstrumented function
    pub fn wrapped_fn(&self) -> &F {
        &self.inner
    }

    pub fn into_inner(self) -> F {
        self.inner
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }
}

impl<F> fmt::Debug for Intercepted<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intercepted")
            .field("callback", &self.callback)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchOutcome;
    use crate::hook::registry::SharedRegistry;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn fallback_cb() -> Callback {
        Callback::new(|_| Ok(DispatchOutcome::Fallback))
    }

    fn isolated() -> Arc<dyn HookRegistry> {
        Arc::new(SharedRegistry::new())
    }

    #[test]
    fn test_enter_exit_restores_previous() {
        let registry = isolated();
        let outer = fallback_cb();
        registry.install(outer.clone());

        let cb = fallback_cb();
        let mut scope = InterceptionScope::with_registry(cb.clone(), registry.clone());
        scope.enter().unwrap();
        assert!(scope.is_active());
        assert!(registry.current().same(&cb));

        scope.exit().unwrap();
        assert!(!scope.is_active());
        assert!(registry.current().same(&outer));
    }

    #[test]
    fn test_enter_with_no_prior_scope_displaces_null() {
        let registry = isolated();
        let mut scope = InterceptionScope::with_registry(fallback_cb(), registry.clone());
        scope.enter().unwrap();
        scope.exit().unwrap();
        assert!(registry.current().is_null());
    }

    #[test]
    fn test_double_enter_and_idle_exit_rejected() {
        let registry = isolated();
        let mut scope = InterceptionScope::with_registry(fallback_cb(), registry.clone());
        assert_eq!(scope.exit(), Err(ScopeError::NotActive));
        scope.enter().unwrap();
        assert_eq!(scope.enter(), Err(ScopeError::AlreadyActive));
        scope.exit().unwrap();
        assert!(registry.current().is_null());
    }

    #[test]
    fn test_strict_nesting() {
        let registry = isolated();
        let c1 = fallback_cb();
        let c2 = fallback_cb();
        let mut s1 = InterceptionScope::with_registry(c1.clone(), registry.clone());
        let mut s2 = InterceptionScope::with_registry(c2.clone(), registry.clone());

        s1.enter().unwrap();
        s2.enter().unwrap();
        assert!(registry.current().same(&c2));
        s2.exit().unwrap();
        assert!(registry.current().same(&c1));
        s1.exit().unwrap();
        assert!(registry.current().is_null());
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let registry = isolated();
        let cb = fallback_cb();
        let scope = InterceptionScope::with_registry(cb.clone(), registry.clone());
        {
            let guard = scope.activate();
            assert!(guard.previous().is_some_and(Callback::is_null));
            assert!(registry.current().same(&cb));
        }
        assert!(registry.current().is_null());
    }

    #[test]
    fn test_same_scope_activated_recursively() {
        let registry = isolated();
        let cb = fallback_cb();
        let scope = InterceptionScope::with_registry(cb.clone(), registry.clone());

        fn recurse(scope: &InterceptionScope, depth: usize) {
            if depth == 0 {
                return;
            }
            let _g = scope.activate();
            recurse(scope, depth - 1);
        }
        recurse(&scope, 5);
        assert!(registry.current().is_null());
    }

    #[test]
    fn test_wrapped_call_restores_on_success() {
        let registry = isolated();
        let cb = fallback_cb();
        let scope = InterceptionScope::with_registry(cb.clone(), registry.clone());

        let seen = registry.clone();
        let inner_cb = cb.clone();
        let wrapped = scope.wrap(move |x: i32| (x * 2, seen.current().same(&inner_cb)));

        assert_eq!(wrapped.call(21), (42, true));
        assert!(registry.current().is_null());

        // The original function runs without the callback installed
        assert_eq!((wrapped.wrapped_fn())(4), (8, false));
        assert!(registry.current().is_null());
    }

    #[test]
    fn test_wrapped_call_restores_on_err() {
        let registry = isolated();
        let outer = fallback_cb();
        registry.install(outer.clone());

        let scope = InterceptionScope::with_registry(fallback_cb(), registry.clone());
        let wrapped = scope.wrap(|_: ()| -> Result<(), String> { Err("boom".to_string()) });

        assert_eq!(wrapped.call(()), Err("boom".to_string()));
        assert!(registry.current().same(&outer));
    }

    #[test]
    fn test_wrapped_call_restores_on_panic() {
        let registry = isolated();
        let scope = InterceptionScope::with_registry(fallback_cb(), registry.clone());
        let wrapped = scope.wrap(|_: ()| -> i32 { panic!("always fails") });

        let result = catch_unwind(AssertUnwindSafe(|| wrapped.call(())));
        assert!(result.is_err());
        assert!(registry.current().is_null());
    }

    #[test]
    fn test_nested_wrapped_functions() {
        let registry = isolated();
        let c1 = fallback_cb();
        let c2 = fallback_cb();

        let inner_reg = registry.clone();
        let c2_check = c2.clone();
        let inner = Arc::new(
            InterceptionScope::with_registry(c2.clone(), registry.clone()).wrap(move |x: i32| {
                assert!(inner_reg.current().same(&c2_check));
                x + 1
            }),
        );

        let outer_reg = registry.clone();
        let c1_check = c1.clone();
        let outer = InterceptionScope::with_registry(c1.clone(), registry.clone()).wrap(move |x: i32| {
            let y = inner.call(x);
            assert!(outer_reg.current().same(&c1_check));
            y * 10
        });

        assert_eq!(outer.call(1), 20);
        assert!(registry.current().is_null());
    }

    #[test]
    fn test_drop_while_active_restores() {
        let registry = isolated();
        {
            let mut scope = InterceptionScope::with_registry(fallback_cb(), registry.clone());
            scope.enter().unwrap();
        }
        assert!(registry.current().is_null());
    }
}
