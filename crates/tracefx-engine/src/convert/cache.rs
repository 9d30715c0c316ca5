//! Caching layer in front of a frame converter
//!
//! Stores guarded replacement code per code object and backend so that
//! repeated frames of the same function reuse earlier conversions, and
//! remembers the argument signatures the inner converter declined so those
//! frames are not offered again.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::backend::CompilerBackend;
use crate::convert::{Conversion, FrameConverter, GuardedCode};
use crate::frame::{CodeId, Frame, TypeTag};

/// Default number of guarded variants kept per code object
pub const DEFAULT_MAX_VARIANTS: usize = 8;

/// Identity of the backend a unit was produced with.
///
/// The name separates zero-sized backends, which may share an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BackendKey {
    name: String,
    addr: usize,
}

impl BackendKey {
    fn of(backend: &dyn CompilerBackend) -> Self {
        BackendKey {
            name: backend.name().to_string(),
            addr: std::ptr::from_ref(backend).cast::<()>() as usize,
        }
    }
}

type CacheKey = (CodeId, BackendKey);

#[derive(Default)]
struct CodeEntry {
    /// Guarded variants, most recent last
    variants: Vec<GuardedCode>,
    /// Argument signature → reason the inner converter gave for declining
    declined: FxHashMap<Vec<TypeTag>, String>,
    /// Set once the variant cap is exceeded; declines every frame
    exhausted: Option<String>,
}

/// Thread-safe caching wrapper around another [`FrameConverter`]
pub struct CachingConverter<C> {
    inner: C,
    entries: RwLock<FxHashMap<CacheKey, CodeEntry>>,
    max_variants: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C: FrameConverter> CachingConverter<C> {
    pub fn new(inner: C) -> Self {
        Self::with_max_variants(inner, DEFAULT_MAX_VARIANTS)
    }

    /// Cap the number of guarded variants per code object.
    ///
    /// A code object that keeps failing its guards past the cap is declined
    /// from then on.
    pub fn with_max_variants(inner: C, max_variants: usize) -> Self {
        CachingConverter {
            inner,
            entries: RwLock::new(FxHashMap::default()),
            max_variants,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lookup(&self, key: &CacheKey, frame: &Frame) -> Option<Conversion> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if let Some(reason) = &entry.exhausted {
            return Some(Conversion::Declined(reason.clone()));
        }
        if let Some(unit) = entry.variants.iter().rev().find(|unit| unit.check(frame)) {
            return Some(Conversion::Converted(unit.clone()));
        }
        entry
            .declined
            .get(&frame.arg_types())
            .map(|reason| Conversion::Declined(reason.clone()))
    }

    /// Drop everything cached for a code object, across all backends
    pub fn invalidate(&self, code: CodeId) {
        self.entries.write().retain(|(id, _), _| *id != code);
    }

    /// Whether any guarded variant is cached for a code object
    pub fn contains(&self, code: CodeId) -> bool {
        self.entries
            .read()
            .iter()
            .any(|((id, _), entry)| *id == code && !entry.variants.is_empty())
    }

    /// Whether any frame of a code object is remembered as declined
    pub fn is_skipped(&self, code: CodeId) -> bool {
        self.entries.read().iter().any(|((id, _), entry)| {
            *id == code && (entry.exhausted.is_some() || !entry.declined.is_empty())
        })
    }

    /// Total cached variants across all code objects
    pub fn entry_count(&self) -> usize {
        self.entries.read().values().map(|entry| entry.variants.len()).sum()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: FrameConverter> FrameConverter for CachingConverter<C> {
    fn convert(&self, frame: &Frame, backend: &dyn CompilerBackend) -> Conversion {
        let key = (frame.code.id, BackendKey::of(backend));
        if let Some(cached) = self.lookup(&key, frame) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return cached;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        match self.inner.convert(frame, backend) {
            Conversion::Converted(unit) => {
                let mut entries = self.entries.write();
                let entry = entries.entry(key).or_default();
                if entry.variants.len() >= self.max_variants {
                    let reason = format!(
                        "'{}' exceeded {} cached variants",
                        frame.name(),
                        self.max_variants
                    );
                    entry.variants.clear();
                    entry.exhausted = Some(reason.clone());
                    return Conversion::Declined(reason);
                }
                entry.variants.push(unit.clone());
                Conversion::Converted(unit)
            }
            Conversion::Declined(reason) => {
                self.entries
                    .write()
                    .entry(key)
                    .or_default()
                    .declined
                    .insert(frame.arg_types(), reason.clone());
                Conversion::Declined(reason)
            }
            // Failures are not remembered; the next frame tries again
            failed @ Conversion::Failed(_) => failed,
        }
    }
}
