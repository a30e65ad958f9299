//! Interfaces of the collaborators the session gate consumes.
//!
//! - `IdentityProvider`: federated sign-in / sign-out
//! - `AuthorizationRecordStore`: remote keyed store of authorization records
//!   with a per-key push subscription
//! - `NavigationController`: resets the navigation stack to a single root

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{IdentityResult, SyncResult};
use crate::models::{AuthorizationRecord, Identity, RecordDefaults};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self) -> IdentityResult<Identity>;

    async fn sign_out(&self) -> IdentityResult<()>;
}

/// Receives every snapshot a subscription delivers, already decoded.
pub type SnapshotCallback = Arc<dyn Fn(AuthorizationRecord) + Send + Sync>;

/// Handle that cancels a push subscription. Cancelling happens at most once,
/// either through [`Unsubscribe::cancel`] or when the handle is dropped.
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send>>);

impl Unsubscribe {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(cancel)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("pending", &self.0.is_some())
            .finish()
    }
}

#[async_trait]
pub trait AuthorizationRecordStore: Send + Sync {
    async fn get(&self, uid: &str) -> SyncResult<Option<AuthorizationRecord>>;

    /// Subscribe to the record under `uid`. Implementations decode documents
    /// before calling `on_snapshot` and may redeliver or reorder snapshots
    /// after a reconnect.
    fn watch(&self, uid: &str, on_snapshot: SnapshotCallback) -> Unsubscribe;

    async fn create(&self, uid: &str, defaults: RecordDefaults) -> SyncResult<()>;
}

pub trait NavigationController: Send + Sync {
    /// Replace the whole navigation history with `route_name` as the only entry.
    fn reset_to(&self, route_name: &str);

    fn current_root(&self) -> Option<String>;
}
