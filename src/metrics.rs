//! Engine-wide counters, gathered in one place for the periodic metrics
//! ticker and for host introspection — the interceptor and audit writer
//! keep their own atomics; this just aggregates a read-only snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audit::AuditMetrics;
use crate::interceptor::InterceptorMetrics;

#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub rule_errors: AtomicU64,
}

pub struct MetricsSnapshot {
    pub packets_total: u64,
    pub packets_bypassed: u64,
    pub packets_dropped_queue_full: u64,
    pub packets_dropped_rate_limited: u64,
    pub process_lookup_failed: u64,
    pub deadline_exceeded: u64,
    pub audit_written: u64,
    pub audit_dropped: u64,
    pub audit_write_failures: u64,
    pub audit_rotations: u64,
    pub rule_errors: u64,
}

pub fn snapshot(
    interceptor: &Arc<InterceptorMetrics>,
    audit: &Arc<AuditMetrics>,
    engine: &Arc<EngineMetrics>,
) -> MetricsSnapshot {
    MetricsSnapshot {
        packets_total: interceptor.packets_total.load(Ordering::Relaxed),
        packets_bypassed: interceptor.packets_bypassed.load(Ordering::Relaxed),
        packets_dropped_queue_full: interceptor.packets_dropped_queue_full.load(Ordering::Relaxed),
        packets_dropped_rate_limited: interceptor.packets_dropped_rate_limited.load(Ordering::Relaxed),
        process_lookup_failed: interceptor.process_lookup_failed.load(Ordering::Relaxed),
        deadline_exceeded: interceptor.deadline_exceeded.load(Ordering::Relaxed),
        audit_written: audit.written.load(Ordering::Relaxed),
        audit_dropped: audit.dropped_channel_full.load(Ordering::Relaxed),
        audit_write_failures: audit.write_failures.load(Ordering::Relaxed),
        audit_rotations: audit.rotations.load(Ordering::Relaxed),
        rule_errors: engine.rule_errors.load(Ordering::Relaxed),
    }
}

/// Sustained-failure escalation: audit write failures (>N in T
/// seconds) should be surfaced to the host as a health degradation. The
/// ticker compares against the previous snapshot's count and logs once the
/// threshold is crossed within the configured window.
pub struct FailureEscalation {
    threshold: u32,
    window: std::time::Duration,
    window_start: std::time::Instant,
    count_at_window_start: u64,
}

impl FailureEscalation {
    pub fn new(threshold: u32, window: std::time::Duration) -> Self {
        FailureEscalation {
            threshold,
            window,
            window_start: std::time::Instant::now(),
            count_at_window_start: 0,
        }
    }

    /// Returns true the first time failures-within-window crosses the
    /// threshold; resets the window once it elapses.
    pub fn observe(&mut self, total_failures: u64) -> bool {
        if self.window_start.elapsed() > self.window {
            self.window_start = std::time::Instant::now();
            self.count_at_window_start = total_failures;
            return false;
        }
        total_failures.saturating_sub(self.count_at_window_start) > self.threshold as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_trips_after_threshold_within_window() {
        let mut esc = FailureEscalation::new(3, std::time::Duration::from_secs(60));
        assert!(!esc.observe(2));
        assert!(esc.observe(4));
    }

    #[test]
    fn escalation_resets_after_window_elapses() {
        let mut esc = FailureEscalation::new(1, std::time::Duration::from_millis(1));
        assert!(esc.observe(5));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(!esc.observe(5));
    }
}
