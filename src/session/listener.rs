use std::sync::Arc;

use crate::models::AuthorizationRecord;
use crate::providers::{AuthorizationRecordStore, SnapshotCallback, Unsubscribe};

use super::SnapshotOutcome;

/// Where the listener forwards deliveries. Implemented by the session store.
pub trait SnapshotSink: Send + Sync {
    fn apply_record_snapshot(&self, record: AuthorizationRecord) -> SnapshotOutcome;
}

struct ActiveSubscription {
    uid: String,
    unsubscribe: Unsubscribe,
}

/// Holds at most one record subscription and forwards every delivery, as is,
/// to its sink.
pub struct AuthorizationSyncListener {
    records: Arc<dyn AuthorizationRecordStore>,
    sink: Arc<dyn SnapshotSink>,
    active: Option<ActiveSubscription>,
}

impl AuthorizationSyncListener {
    pub fn new(records: Arc<dyn AuthorizationRecordStore>, sink: Arc<dyn SnapshotSink>) -> Self {
        Self {
            records,
            sink,
            active: None,
        }
    }

    pub fn attach(&mut self, uid: &str) {
        self.detach();

        let sink = Arc::clone(&self.sink);
        let on_snapshot: SnapshotCallback = Arc::new(move |record| {
            sink.apply_record_snapshot(record);
        });

        tracing::debug!(uid = %uid, "attaching authorization record subscription");
        let unsubscribe = self.records.watch(uid, on_snapshot);
        self.active = Some(ActiveSubscription {
            uid: uid.to_string(),
            unsubscribe,
        });
    }

    pub fn detach(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(uid = %active.uid, "detaching authorization record subscription");
            active.unsubscribe.cancel();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.active.is_some()
    }

    pub fn attached_uid(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.uid.as_str())
    }
}

impl Drop for AuthorizationSyncListener {
    fn drop(&mut self) {
        self.detach();
    }
}
