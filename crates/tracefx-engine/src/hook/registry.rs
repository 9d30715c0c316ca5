//! The single-slot frame callback registry
//!
//! A registry holds exactly one [`Callback`]. Installing a callback swaps it
//! in and hands back whatever it displaced; scopes keep that value and put it
//! back on exit.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::dispatch::DispatchOutcome;
use crate::error::HookError;
use crate::frame::Frame;

/// Signature of an active frame handler
pub type FrameHook = dyn Fn(&Frame) -> Result<DispatchOutcome, HookError> + Send + Sync;

/// The frame handler installed in a registry
#[derive(Clone, Default)]
pub enum Callback {
    /// No interception: frames run unmodified
    #[default]
    Null,
    /// Every frame is offered to this handler before it runs
    Active(Arc<FrameHook>),
}

impl Callback {
    /// Wrap a closure as an active callback
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&Frame) -> Result<DispatchOutcome, HookError> + Send + Sync + 'static,
    {
        Callback::Active(Arc::new(hook))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Callback::Null)
    }

    /// Identity comparison: two `Active` callbacks are the same only if they
    /// share the same allocation.
    pub fn same(&self, other: &Callback) -> bool {
        match (self, other) {
            (Callback::Null, Callback::Null) => true,
            (Callback::Active(a), Callback::Active(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }

    /// Offer a frame to this callback. `Null` always falls back.
    pub fn invoke(&self, frame: &Frame) -> Result<DispatchOutcome, HookError> {
        match self {
            Callback::Null => Ok(DispatchOutcome::Fallback),
            Callback::Active(hook) => hook(frame),
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Null => f.write_str("Callback::Null"),
            Callback::Active(hook) => write!(f, "Callback::Active({:p})", Arc::as_ptr(hook) as *const ()),
        }
    }
}

/// Storage for the active frame callback
///
/// `install` must be atomic with respect to [`HookRegistry::current`]: a
/// reader sees either the old or the new callback, never a partial state.
pub trait HookRegistry: Send + Sync {
    /// Make `callback` the active handler, returning the displaced one
    fn install(&self, callback: Callback) -> Callback;

    /// The currently active handler
    fn current(&self) -> Callback;
}

/// One slot shared by every thread
///
/// Installation is atomic, but scopes opened concurrently from several
/// threads interleave their restores. Callers that share one of these across
/// threads must serialize scope entry and exit themselves. Tests use it as an
/// isolated, injectable registry.
#[derive(Default)]
pub struct SharedRegistry {
    slot: Mutex<Callback>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HookRegistry for SharedRegistry {
    fn install(&self, callback: Callback) -> Callback {
        std::mem::replace(&mut *self.slot.lock(), callback)
    }

    fn current(&self) -> Callback {
        self.slot.lock().clone()
    }
}

impl fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("slot", &*self.slot.lock())
            .finish()
    }
}

thread_local! {
    static THREAD_SLOT: RefCell<Callback> = RefCell::new(Callback::Null);
}

/// One slot per native thread
///
/// Each thread nests scopes independently; a callback installed on one
/// thread never intercepts frames evaluated on another.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRegistry;

impl HookRegistry for ThreadRegistry {
    fn install(&self, callback: Callback) -> Callback {
        THREAD_SLOT.with(|slot| slot.replace(callback))
    }

    fn current(&self) -> Callback {
        THREAD_SLOT.with(|slot| slot.borrow().clone())
    }
}

static GLOBAL: Lazy<Arc<dyn HookRegistry>> = Lazy::new(|| Arc::new(ThreadRegistry));

/// The process-wide registry used when no registry is injected.
///
/// Backed by [`ThreadRegistry`], so the slot it exposes belongs to the
/// calling thread.
pub fn global() -> Arc<dyn HookRegistry> {
    GLOBAL.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace_all() -> Callback {
        Callback::new(|_| Ok(DispatchOutcome::Fallback))
    }

    #[test]
    fn test_shared_install_returns_previous() {
        let registry = SharedRegistry::new();
        assert!(registry.current().is_null());

        let cb = replace_all();
        let prev = registry.install(cb.clone());
        assert!(prev.is_null());
        assert!(registry.current().same(&cb));

        let prev = registry.install(Callback::Null);
        assert!(prev.same(&cb));
        assert!(registry.current().is_null());
    }

    #[test]
    fn test_callback_identity() {
        let a = replace_all();
        let b = replace_all();
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert!(!a.same(&Callback::Null));
        assert!(Callback::Null.same(&Callback::default()));
    }

    #[test]
    fn test_thread_registry_is_per_thread() {
        let cb = replace_all();
        let prev = ThreadRegistry.install(cb.clone());

        let other = std::thread::spawn(|| ThreadRegistry.current().is_null())
            .join()
            .unwrap();
        assert!(other, "callback leaked into another thread");
        assert!(ThreadRegistry.current().same(&cb));

        ThreadRegistry.install(prev);
    }

    #[test]
    fn test_null_callback_falls_back() {
        let code = std::sync::Arc::new(crate::frame::CodeObject::new("f", 0, 0, vec![]));
        let frame = Frame::new(code, &[], 0);
        assert!(matches!(Callback::Null.invoke(&frame), Ok(DispatchOutcome::Fallback)));
    }
}
