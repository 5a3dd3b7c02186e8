//! Duration recording for scan operations.
//!
//! Observability only: nothing here affects scan results. Records go out as
//! `tracing` debug events under the `lfsr::perf` target.

use std::time::{Duration, Instant};

/// Record an elapsed duration under `label`.
pub fn record_duration(label: &str, elapsed: Duration) {
    tracing::debug!(
        target: "lfsr::perf",
        label,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "timed section"
    );
}

/// Guard that records the time from construction to drop.
pub struct PerfTimer {
    label: &'static str,
    start: Instant,
}

impl PerfTimer {
    pub fn start(label: &'static str) -> Self {
        PerfTimer {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        record_duration(self.label, self.start.elapsed());
    }
}
