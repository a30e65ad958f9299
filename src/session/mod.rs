//! Session store and authorization sync listener.
//!
//! The store is the single writer of `SessionState`. The listener is a thin
//! conduit from the record store's push subscription into
//! `SessionStore::apply_record_snapshot`; ordering and idempotence are decided
//! by the store, not the listener.

mod diagnostics;
mod listener;
mod store;

pub use diagnostics::{DiagnosticsSnapshot, SnapshotOutcome, SyncDiagnostics};
pub use listener::{AuthorizationSyncListener, SnapshotSink};
pub use store::SessionStore;
