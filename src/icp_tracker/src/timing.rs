//! Timing instrumentation for profiling.
//!
//! With the `profiling` feature the [`Timer`] measures wall-clock time;
//! without it every method compiles to a constant and the timing fields of
//! the debug record stay empty.

#[cfg(feature = "profiling")]
use std::time::Instant;

use tracing::trace;

/// Whether timings are collected in this build.
pub const PROFILING_ENABLED: bool = cfg!(feature = "profiling");

/// Timer that can be enabled/disabled at compile time.
#[cfg(feature = "profiling")]
pub struct Timer {
    start: Instant,
    name: &'static str,
}

#[cfg(feature = "profiling")]
impl Timer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// No-op timer when profiling is disabled.
#[cfg(not(feature = "profiling"))]
pub struct Timer;

#[cfg(not(feature = "profiling"))]
impl Timer {
    #[inline(always)]
    pub fn new(_name: &'static str) -> Self {
        Self
    }

    #[inline(always)]
    pub fn elapsed_ms(&self) -> f64 {
        0.0
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        ""
    }
}

/// Elapsed milliseconds, or `None` when profiling is disabled.
#[inline]
pub fn measured_ms(timer: &Timer) -> Option<f64> {
    PROFILING_ENABLED.then(|| {
        let ms = timer.elapsed_ms();
        trace!(timer = timer.name(), ms, "timing");
        ms
    })
}
