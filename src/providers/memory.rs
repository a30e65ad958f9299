//! In-process collaborators: a scripted identity provider, a document-backed
//! record store with push subscriptions, and a navigator that records resets.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use uuid::Uuid;

use super::{AuthorizationRecordStore, IdentityProvider, NavigationController, SnapshotCallback, Unsubscribe};
use crate::config::RecordStoreConfig;
use crate::errors::{IdentityError, IdentityResult, RecordSyncError, SyncResult};
use crate::models::{AuthorizationRecord, Identity, RecordDefaults};

#[derive(Default)]
pub struct MemoryIdentityProvider {
    script: Mutex<VecDeque<IdentityResult<Identity>>>,
    fallback: Mutex<Option<Identity>>,
    hold: Mutex<Option<Arc<Notify>>>,
    sign_ins: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that signs in as `identity` whenever no scripted result is queued.
    pub fn with_identity(identity: Identity) -> Self {
        let provider = Self::default();
        *provider.fallback.lock() = Some(identity);
        provider
    }

    /// Provider for a fresh account with a random uid.
    pub fn for_email(email: &str) -> Self {
        Self::with_identity(Identity::new(Uuid::new_v4().to_string(), email))
    }

    pub fn push_result(&self, result: IdentityResult<Identity>) {
        self.script.lock().push_back(result);
    }

    pub fn set_identity(&self, identity: Identity) {
        *self.fallback.lock() = Some(identity);
    }

    /// Make the next `sign_in` wait until the returned handle is notified.
    pub fn hold_sign_in(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock() = Some(notify.clone());
        notify
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self) -> IdentityResult<Identity> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);

        let hold = self.hold.lock().take();
        if let Some(hold) = hold {
            hold.notified().await;
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(result) => result,
            None => self
                .fallback
                .lock()
                .clone()
                .ok_or_else(|| IdentityError::provider_unavailable("no account configured")),
        }
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Watcher {
    id: u64,
    callback: SnapshotCallback,
}

type WatcherMap = HashMap<String, Vec<Watcher>>;

/// Keyed JSON documents with per-key subscriptions. Documents are decoded into
/// `AuthorizationRecord`s on the way out; undecodable ones never reach a
/// subscriber.
pub struct MemoryRecordStore {
    documents: Mutex<HashMap<String, Value>>,
    watchers: Arc<Mutex<WatcherMap>>,
    next_watch_id: AtomicU64,
    strict_wire: bool,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            watchers: Arc::new(Mutex::new(HashMap::new())),
            next_watch_id: AtomicU64::new(1),
            strict_wire: false,
        }
    }

    pub fn from_config(config: &RecordStoreConfig) -> Self {
        Self::new().with_strict_wire(config.strict_wire)
    }

    pub fn with_strict_wire(mut self, strict: bool) -> Self {
        self.strict_wire = strict;
        self
    }

    /// Write a raw document and push it to subscribers of `uid`.
    pub fn put_document(&self, uid: &str, document: Value) {
        self.documents.lock().insert(uid.to_string(), document.clone());
        self.deliver(uid, &document);
    }

    pub fn put_record(&self, record: &AuthorizationRecord) {
        self.put_document(&record.uid, record.to_document());
    }

    /// Administrative approve / revoke.
    pub fn set_approval(&self, uid: &str, approved: bool, at: DateTime<Utc>) -> SyncResult<()> {
        let document = {
            let mut documents = self.documents.lock();
            let document = documents
                .get_mut(uid)
                .ok_or_else(|| RecordSyncError::store(format!("no record for uid {uid}")))?;
            let fields = document
                .as_object_mut()
                .ok_or_else(|| RecordSyncError::store(format!("record for uid {uid} is not an object")))?;
            fields.insert("approved".to_string(), Value::Bool(approved));
            fields.insert("updatedAt".to_string(), Value::String(at.to_rfc3339()));
            document.clone()
        };
        self.deliver(uid, &document);
        Ok(())
    }

    /// Push a document to subscribers without storing it, the way a reconnecting
    /// subscription replays an older snapshot.
    pub fn redeliver(&self, uid: &str, document: Value) {
        self.deliver(uid, &document);
    }

    pub fn document(&self, uid: &str) -> Option<Value> {
        self.documents.lock().get(uid).cloned()
    }

    pub fn watcher_count(&self, uid: &str) -> usize {
        self.watchers.lock().get(uid).map(Vec::len).unwrap_or(0)
    }

    pub fn total_watchers(&self) -> usize {
        self.watchers.lock().values().map(Vec::len).sum()
    }

    fn decode(&self, uid: &str, document: &Value) -> Option<AuthorizationRecord> {
        match AuthorizationRecord::from_document(uid, document, self.strict_wire) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(uid = %uid, error = %err, "dropping undecodable authorization record");
                None
            }
        }
    }

    fn deliver(&self, uid: &str, document: &Value) {
        let Some(record) = self.decode(uid, document) else {
            return;
        };

        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<SnapshotCallback> = self
            .watchers
            .lock()
            .get(uid)
            .map(|watchers| watchers.iter().map(|w| w.callback.clone()).collect())
            .unwrap_or_default();

        for callback in callbacks {
            callback(record.clone());
        }
    }
}

#[async_trait]
impl AuthorizationRecordStore for MemoryRecordStore {
    async fn get(&self, uid: &str) -> SyncResult<Option<AuthorizationRecord>> {
        let document = self.documents.lock().get(uid).cloned();
        match document {
            Some(document) => Ok(Some(AuthorizationRecord::from_document(uid, &document, self.strict_wire)?)),
            None => Ok(None),
        }
    }

    fn watch(&self, uid: &str, on_snapshot: SnapshotCallback) -> Unsubscribe {
        let id = self.next_watch_id.fetch_add(1, Ordering::SeqCst);
        self.watchers
            .lock()
            .entry(uid.to_string())
            .or_default()
            .push(Watcher {
                id,
                callback: on_snapshot.clone(),
            });

        // Initial snapshot, like a hosted store's first listener callback.
        let current = self.documents.lock().get(uid).cloned();
        if let Some(record) = current.and_then(|document| self.decode(uid, &document)) {
            on_snapshot(record);
        }

        let watchers = Arc::clone(&self.watchers);
        let key = uid.to_string();
        Unsubscribe::new(move || {
            let mut watchers = watchers.lock();
            if let Some(list) = watchers.get_mut(&key) {
                list.retain(|w| w.id != id);
                if list.is_empty() {
                    watchers.remove(&key);
                }
            }
        })
    }

    async fn create(&self, uid: &str, defaults: RecordDefaults) -> SyncResult<()> {
        let document = defaults.into_record(uid).to_document();
        {
            let mut documents = self.documents.lock();
            if documents.contains_key(uid) {
                return Err(RecordSyncError::store(format!("record for uid {uid} already exists")));
            }
            documents.insert(uid.to_string(), document.clone());
        }
        self.deliver(uid, &document);
        Ok(())
    }
}

/// Navigator that keeps the current root and every reset it was asked for.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    root: Mutex<Option<String>>,
    resets: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(route_name: &str) -> Self {
        let navigator = Self::default();
        *navigator.root.lock() = Some(route_name.to_string());
        navigator
    }

    pub fn resets(&self) -> Vec<String> {
        self.resets.lock().clone()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.lock().len()
    }
}

impl NavigationController for MemoryNavigator {
    fn reset_to(&self, route_name: &str) {
        tracing::debug!(route = %route_name, "navigation reset");
        *self.root.lock() = Some(route_name.to_string());
        self.resets.lock().push(route_name.to_string());
    }

    fn current_root(&self) -> Option<String> {
        self.root.lock().clone()
    }
}
