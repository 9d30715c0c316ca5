//! The optimize dispatcher
//!
//! [`OptimizeDispatcher::build`] produces the [`Callback`] that decides, per
//! intercepted frame, whether to run replacement code:
//!
//! | Converter result | Callback result |
//! |------------------|-----------------|
//! | `Converted(unit)` | `Ok(Replace(unit))` |
//! | `Declined(reason)` | logged, `Ok(Fallback)` |
//! | `Failed(cause)` | `Err(HookError::Conversion(cause))` |
//!
//! [`optimize`] and [`optimize_fn`] are the two entry points: the first
//! returns a scope to open around arbitrary code, the second wraps one
//! function directly. `optimize_fn(f, b)` behaves exactly like
//! `optimize(b).wrap(f)`.

use std::sync::Arc;

use crate::backend::{default_backend, CompilerBackend};
use crate::config::DispatchConfig;
use crate::convert::{CachingConverter, Conversion, EagerConverter, FrameConverter, GuardedCode};
use crate::error::HookError;
use crate::frame::Frame;
use crate::hook::{global, Callback, HookRegistry, Intercepted, InterceptionScope};
use crate::profiling::DispatchStats;

/// What the interpreter should do with an intercepted frame
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Run this code instead of the frame's own
    Replace(GuardedCode),
    /// Run the frame unmodified
    Fallback,
}

/// State captured by every callback built from one dispatcher
struct Dispatch {
    converter: Arc<dyn FrameConverter>,
    backend: Arc<dyn CompilerBackend>,
    config: DispatchConfig,
    stats: Arc<DispatchStats>,
}

impl Dispatch {
    fn handle(&self, frame: &Frame) -> Result<DispatchOutcome, HookError> {
        let record = self.config.record_stats;
        if record {
            self.stats.record_intercepted();
        }

        match self.converter.convert(frame, &*self.backend) {
            Conversion::Converted(unit) => {
                if record {
                    self.stats.record_replaced();
                }
                Ok(DispatchOutcome::Replace(unit))
            }
            Conversion::Declined(reason) => {
                log::log!(
                    target: "tracefx::dispatch",
                    self.config.declined_level,
                    "!! not converted '{}': {}",
                    frame.name(),
                    reason
                );
                if record {
                    self.stats.record_declined();
                }
                Ok(DispatchOutcome::Fallback)
            }
            Conversion::Failed(cause) => {
                if record {
                    self.stats.record_failed();
                }
                Err(HookError::Conversion(cause))
            }
        }
    }
}

/// Builds frame callbacks around a converter and a compiler backend
pub struct OptimizeDispatcher {
    dispatch: Arc<Dispatch>,
    registry: Arc<dyn HookRegistry>,
}

impl OptimizeDispatcher {
    /// Dispatcher over `converter` with the default backend and the
    /// process-wide registry
    pub fn new(converter: Arc<dyn FrameConverter>) -> Self {
        OptimizeDispatcher {
            dispatch: Arc::new(Dispatch {
                converter,
                backend: default_backend(),
                config: DispatchConfig::default(),
                stats: Arc::new(DispatchStats::new()),
            }),
            registry: global(),
        }
    }

    fn update(mut self, f: impl FnOnce(&mut Dispatch)) -> Self {
        let mut dispatch = Dispatch {
            converter: self.dispatch.converter.clone(),
            backend: self.dispatch.backend.clone(),
            config: self.dispatch.config.clone(),
            stats: self.dispatch.stats.clone(),
        };
        f(&mut dispatch);
        self.dispatch = Arc::new(dispatch);
        self
    }

    pub fn with_backend(self, backend: Arc<dyn CompilerBackend>) -> Self {
        self.update(|d| d.backend = backend)
    }

    pub fn with_config(self, config: DispatchConfig) -> Self {
        self.update(|d| d.config = config)
    }

    pub fn with_stats(self, stats: Arc<DispatchStats>) -> Self {
        self.update(|d| d.stats = stats)
    }

    /// Install scopes into `registry` instead of the process-wide one
    pub fn with_registry(mut self, registry: Arc<dyn HookRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn backend(&self) -> &Arc<dyn CompilerBackend> {
        &self.dispatch.backend
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.dispatch.stats
    }

    /// Classify one frame directly, without going through a registry
    pub fn dispatch(&self, frame: &Frame) -> Result<DispatchOutcome, HookError> {
        self.dispatch.handle(frame)
    }

    /// The frame callback for this dispatcher
    pub fn build(&self) -> Callback {
        let dispatch = self.dispatch.clone();
        Callback::new(move |frame| dispatch.handle(frame))
    }

    /// A scope that installs this dispatcher's callback
    pub fn scope(&self) -> InterceptionScope {
        InterceptionScope::with_registry(self.build(), self.registry.clone())
    }

    /// Wrap `model` so each call runs with this dispatcher's callback
    pub fn wrap<F>(&self, model: F) -> Intercepted<F> {
        self.scope().wrap(model)
    }
}

/// The default converter with the default backend over the process-wide
/// registry; `OptimizeDispatcher::default().scope()` is `optimize` with no
/// backend chosen
impl Default for OptimizeDispatcher {
    fn default() -> Self {
        OptimizeDispatcher::new(default_converter())
    }
}

/// The converter used by [`optimize`] and [`optimize_fn`]: the eager
/// converter behind a cache
pub fn default_converter() -> Arc<dyn FrameConverter> {
    Arc::new(CachingConverter::new(EagerConverter::new()))
}

/// Interception scope over the process-wide registry that offers every frame
/// to `backend` through the default converter.
///
/// Pass [`default_backend()`] when no particular backend is wanted, or use
/// [`OptimizeDispatcher::default`].
pub fn optimize(backend: Arc<dyn CompilerBackend>) -> InterceptionScope {
    OptimizeDispatcher::new(default_converter())
        .with_backend(backend)
        .scope()
}

/// Wrap `model` with an [`optimize`] scope
pub fn optimize_fn<F>(model: F, backend: Arc<dyn CompilerBackend>) -> Intercepted<F> {
    optimize(backend).wrap(model)
}
