//! Dispatch statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters for dispatch activity.
///
/// Counting can be disabled wholesale through
/// [`RouterConfig::enable_stats`](crate::RouterConfig); the recording
/// methods become no-ops but [`DispatchStats::snapshot`] keeps working.
#[derive(Debug)]
pub struct DispatchStats {
    enabled: bool,
    /// Events that entered dispatch (one per broadcast/dispatch call)
    events_dispatched: AtomicU64,
    /// Envelopes handed to the transport
    deliveries: AtomicU64,
    /// Events queued behind a context activation
    queued_activations: AtomicU64,
    /// Per-target deliveries suppressed by a will-dispatch hook
    vetoes: AtomicU64,
    /// Per-target deliveries dropped (unknown subscriber, permission
    /// denial, transport failure, failed activation)
    dropped_targets: AtomicU64,
    /// Acknowledgements received
    acks: AtomicU64,
}

impl DispatchStats {
    /// Create a new stats block
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            events_dispatched: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            queued_activations: AtomicU64::new(0),
            vetoes: AtomicU64::new(0),
            dropped_targets: AtomicU64::new(0),
            acks: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_event(&self) {
        if self.enabled {
            self.events_dispatched.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_delivery(&self) {
        if self.enabled {
            self.deliveries.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_queued_activation(&self) {
        if self.enabled {
            self.queued_activations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_veto(&self) {
        if self.enabled {
            self.vetoes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_drop(&self) {
        if self.enabled {
            self.dropped_targets.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_ack(&self) {
        if self.enabled {
            self.acks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of all counters
    #[must_use]
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            queued_activations: self.queued_activations.load(Ordering::Relaxed),
            vetoes: self.vetoes.load(Ordering::Relaxed),
            dropped_targets: self.dropped_targets.load(Ordering::Relaxed),
            acks: self.acks.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`DispatchStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStatsSnapshot {
    /// Events that entered dispatch
    pub events_dispatched: u64,
    /// Envelopes handed to the transport
    pub deliveries: u64,
    /// Events queued behind a context activation
    pub queued_activations: u64,
    /// Per-target deliveries suppressed by a will-dispatch hook
    pub vetoes: u64,
    /// Per-target deliveries dropped
    pub dropped_targets: u64,
    /// Acknowledgements received
    pub acks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_and_snapshot() {
        let stats = DispatchStats::new(true);
        stats.record_event();
        stats.record_delivery();
        stats.record_delivery();
        stats.record_veto();
        stats.record_ack();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events_dispatched, 1);
        assert_eq!(snapshot.deliveries, 2);
        assert_eq!(snapshot.vetoes, 1);
        assert_eq!(snapshot.acks, 1);
        assert_eq!(snapshot.dropped_targets, 0);
    }

    #[test]
    fn test_disabled_stats_stay_zero() {
        let stats = DispatchStats::new(false);
        stats.record_event();
        stats.record_drop();
        assert_eq!(stats.snapshot(), DispatchStatsSnapshot::default());
    }
}
