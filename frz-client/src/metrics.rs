//! Producer telemetry counters.
//!
//! A pure side-effect channel: nothing in the delivery path reads these
//! back, so ignoring them changes no observable behavior.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ProducerMetrics {
    pub records_produced: AtomicU64,
    pub records_delivered: AtomicU64,
    pub delivery_attempts: AtomicU64,
    pub delivery_errors: AtomicU64,
    pub buffer_overflows: AtomicU64,
}

impl ProducerMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_produced: self.records_produced.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            delivery_attempts: self.delivery_attempts.load(Ordering::Relaxed),
            delivery_errors: self.delivery_errors.load(Ordering::Relaxed),
            buffer_overflows: self.buffer_overflows.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_produced: u64,
    pub records_delivered: u64,
    pub delivery_attempts: u64,
    pub delivery_errors: u64,
    pub buffer_overflows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_counters() {
        let metrics = ProducerMetrics::default();
        ProducerMetrics::incr(&metrics.records_produced, 3);
        ProducerMetrics::incr(&metrics.delivery_attempts, 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_produced, 3);
        assert_eq!(snapshot.delivery_attempts, 1);
        assert_eq!(snapshot.delivery_errors, 0);
    }
}
