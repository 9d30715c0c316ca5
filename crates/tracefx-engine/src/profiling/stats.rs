//! Dispatch counters
//!
//! Atomic counters the dispatcher bumps once per intercepted frame, one of
//! `replaced`, `declined` or `failed` per frame.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared between a dispatcher and its observers
#[derive(Debug, Default)]
pub struct DispatchStats {
    intercepted: AtomicU64,
    replaced: AtomicU64,
    declined: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSnapshot {
    /// Frames offered to the converter
    pub intercepted: u64,
    /// Frames that got replacement code
    pub replaced: u64,
    /// Frames the converter declined (ran unmodified)
    pub declined: u64,
    /// Frames whose conversion failed
    pub failed: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_intercepted(&self) {
        self.intercepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replaced(&self) {
        self.replaced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_declined(&self) {
        self.declined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            intercepted: self.intercepted.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            declined: self.declined.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.intercepted.store(0, Ordering::Relaxed);
        self.replaced.store(0, Ordering::Relaxed);
        self.declined.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }
}

impl DispatchSnapshot {
    /// Fraction of intercepted frames that got replacement code (0.0 to 1.0)
    pub fn replace_rate(&self) -> f64 {
        if self.intercepted == 0 {
            0.0
        } else {
            self.replaced as f64 / self.intercepted as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_snapshot() {
        let stats = DispatchStats::new();
        for _ in 0..4 {
            stats.record_intercepted();
        }
        stats.record_replaced();
        stats.record_replaced();
        stats.record_replaced();
        stats.record_declined();

        let snap = stats.snapshot();
        assert_eq!(snap.intercepted, 4);
        assert_eq!(snap.replaced, 3);
        assert_eq!(snap.declined, 1);
        assert_eq!(snap.failed, 0);
        assert!((snap.replace_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let stats = DispatchStats::new();
        stats.record_intercepted();
        stats.record_failed();
        stats.reset();
        assert_eq!(stats.snapshot(), DispatchSnapshot::default());
        assert_eq!(stats.snapshot().replace_rate(), 0.0);
    }
}
