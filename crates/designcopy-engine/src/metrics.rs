//! Replication metrics.
//!
//! Counters are atomics; phase durations sit behind a mutex. Shared between
//! the orchestrator and any observer through an `Arc`.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::ReplicationState;

/// Replication metrics collector.
#[derive(Debug, Default)]
pub struct ReplicationMetrics {
    /// Runs started.
    pub runs_started: AtomicU64,
    /// Runs that ended successfully.
    pub runs_succeeded: AtomicU64,
    /// Runs that failed.
    pub runs_failed: AtomicU64,
    /// Runs cancelled by the caller.
    pub runs_cancelled: AtomicU64,
    /// Graph documents saved.
    pub documents_copied: AtomicU64,
    /// Documents (graph or drawing) that failed to save.
    pub documents_failed: AtomicU64,
    /// Drawings saved.
    pub drawings_copied: AtomicU64,
    /// Orphan files copied.
    pub orphans_copied: AtomicU64,
    /// Orphan files skipped because the destination existed.
    pub orphans_skipped: AtomicU64,
    /// Stored references redirected.
    pub references_redirected: AtomicU64,
    /// References that could not be mapped.
    pub references_unresolved: AtomicU64,
    /// Non-CAD files copied.
    pub non_cad_copied: AtomicU64,
    /// Metadata stamps applied.
    pub properties_applied: AtomicU64,
    phase_durations: Mutex<BTreeMap<String, Duration>>,
}

impl ReplicationMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Accumulate time spent in a phase.
    pub fn record_phase(&self, state: ReplicationState, elapsed: Duration) {
        if let Ok(mut phases) = self.phase_durations.lock() {
            *phases.entry(state.to_string()).or_default() += elapsed;
        }
    }

    /// Point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let phase_durations_ms = self
            .phase_durations
            .lock()
            .map(|phases| {
                phases
                    .iter()
                    .map(|(k, v)| (k.clone(), v.as_millis() as u64))
                    .collect()
            })
            .unwrap_or_default();

        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            documents_copied: self.documents_copied.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            drawings_copied: self.drawings_copied.load(Ordering::Relaxed),
            orphans_copied: self.orphans_copied.load(Ordering::Relaxed),
            orphans_skipped: self.orphans_skipped.load(Ordering::Relaxed),
            references_redirected: self.references_redirected.load(Ordering::Relaxed),
            references_unresolved: self.references_unresolved.load(Ordering::Relaxed),
            non_cad_copied: self.non_cad_copied.load(Ordering::Relaxed),
            properties_applied: self.properties_applied.load(Ordering::Relaxed),
            phase_durations_ms,
        }
    }
}

/// A point-in-time snapshot of replication metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Runs started.
    pub runs_started: u64,
    /// Runs that succeeded.
    pub runs_succeeded: u64,
    /// Runs that failed.
    pub runs_failed: u64,
    /// Runs cancelled.
    pub runs_cancelled: u64,
    /// Graph documents saved.
    pub documents_copied: u64,
    /// Documents that failed.
    pub documents_failed: u64,
    /// Drawings saved.
    pub drawings_copied: u64,
    /// Orphans copied.
    pub orphans_copied: u64,
    /// Orphans skipped.
    pub orphans_skipped: u64,
    /// References redirected.
    pub references_redirected: u64,
    /// References left unresolved.
    pub references_unresolved: u64,
    /// Non-CAD files copied.
    pub non_cad_copied: u64,
    /// Metadata stamps applied.
    pub properties_applied: u64,
    /// Cumulative milliseconds per phase.
    pub phase_durations_ms: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counting() {
        let m = ReplicationMetrics::new();
        ReplicationMetrics::incr(&m.documents_copied);
        ReplicationMetrics::incr(&m.documents_copied);
        ReplicationMetrics::add(&m.references_redirected, 3);

        let snap = m.snapshot();
        assert_eq!(snap.documents_copied, 2);
        assert_eq!(snap.references_redirected, 3);
        assert_eq!(snap.runs_failed, 0);
    }

    #[test]
    fn test_phase_durations_accumulate() {
        let m = ReplicationMetrics::new();
        m.record_phase(ReplicationState::GraphCopy, Duration::from_millis(40));
        m.record_phase(ReplicationState::GraphCopy, Duration::from_millis(60));
        m.record_phase(ReplicationState::Finalize, Duration::from_millis(5));

        let snap = m.snapshot();
        assert_eq!(snap.phase_durations_ms.get("graph_copy"), Some(&100));
        assert_eq!(snap.phase_durations_ms.get("finalize"), Some(&5));

        let json = serde_json::to_string(&snap).expect("serialize");
        assert!(json.contains("\"graph_copy\":100"));
    }
}
