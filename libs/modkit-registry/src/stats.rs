//! Lookup instrumentation.
//!
//! Only successful lookups are timed. Each one emits two events: the duration
//! of that call and the running total for the registry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use humantime::format_duration;

use crate::catalog::TypeInfo;

/// Snapshot of a registry's lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupStats {
    /// Successful lookups timed since stats logging was enabled.
    pub lookups: u64,
    /// Cumulative wall-clock time spent in those lookups.
    pub total: Duration,
}

pub struct Instrumentation {
    enabled: AtomicBool,
    lookups: AtomicU64,
    total_nanos: AtomicU64,
    slow_threshold: Option<Duration>,
}

fn u64_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl Instrumentation {
    #[must_use]
    pub fn new(enabled: bool, slow_threshold: Option<Duration>) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            lookups: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            slow_threshold,
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Start time of a lookup, or `None` when instrumentation is off.
    #[must_use]
    pub fn start(&self) -> Option<Instant> {
        self.is_enabled().then(Instant::now)
    }

    pub fn record(&self, query: &TypeInfo, started: Instant) {
        let elapsed = started.elapsed();
        let nanos = u64_nanos(elapsed);
        let total = Duration::from_nanos(
            self.total_nanos
                .fetch_add(nanos, Ordering::Relaxed)
                .saturating_add(nanos),
        );
        let lookups = self
            .lookups
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1);

        if self.slow_threshold.is_some_and(|threshold| elapsed > threshold) {
            tracing::warn!(
                query = query.name(),
                elapsed = %format_duration(elapsed),
                "Slow registry lookup"
            );
        } else {
            tracing::debug!(
                query = query.name(),
                elapsed = %format_duration(elapsed),
                "Registry lookup"
            );
        }
        tracing::debug!(
            lookups,
            total = %format_duration(total),
            "Cumulative registry lookup time"
        );
    }

    #[must_use]
    pub fn snapshot(&self) -> LookupStats {
        LookupStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            total: Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed)),
        }
    }

    /// Same settings, fresh counters.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self::new(self.is_enabled(), self.slow_threshold)
    }
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self::new(false, None)
    }
}
