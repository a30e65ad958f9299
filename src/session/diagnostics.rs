use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Result of offering one snapshot to the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOutcome {
    Applied,
    /// `updated_at` not newer than the record already held.
    StaleDiscarded,
    /// Snapshot for a uid other than the signed-in one.
    UidMismatchDiscarded,
    /// Snapshot arrived while nobody is signed in, e.g. right after sign-out.
    NoActiveIdentity,
}

impl SnapshotOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SnapshotOutcome::Applied)
    }
}

#[derive(Debug, Default)]
pub struct SyncDiagnostics {
    applied: AtomicU64,
    stale_discarded: AtomicU64,
    uid_mismatch_discarded: AtomicU64,
    no_identity_discarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub applied: u64,
    pub stale_discarded: u64,
    pub uid_mismatch_discarded: u64,
    pub no_identity_discarded: u64,
}

impl DiagnosticsSnapshot {
    pub fn discarded(&self) -> u64 {
        self.stale_discarded + self.uid_mismatch_discarded + self.no_identity_discarded
    }
}

impl SyncDiagnostics {
    pub fn record(&self, outcome: SnapshotOutcome) {
        let counter = match outcome {
            SnapshotOutcome::Applied => &self.applied,
            SnapshotOutcome::StaleDiscarded => &self.stale_discarded,
            SnapshotOutcome::UidMismatchDiscarded => &self.uid_mismatch_discarded,
            SnapshotOutcome::NoActiveIdentity => &self.no_identity_discarded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            uid_mismatch_discarded: self.uid_mismatch_discarded.load(Ordering::Relaxed),
            no_identity_discarded: self.no_identity_discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_outcome() {
        let diagnostics = SyncDiagnostics::default();
        diagnostics.record(SnapshotOutcome::Applied);
        diagnostics.record(SnapshotOutcome::StaleDiscarded);
        diagnostics.record(SnapshotOutcome::StaleDiscarded);
        diagnostics.record(SnapshotOutcome::NoActiveIdentity);

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.applied, 1);
        assert_eq!(snapshot.stale_discarded, 2);
        assert_eq!(snapshot.uid_mismatch_discarded, 0);
        assert_eq!(snapshot.discarded(), 3);
    }
}
