use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::errors::{IdentityError, IdentityResult};
use crate::models::{AuthorizationRecord, Identity, SessionPhase, SessionState};
use crate::providers::{AuthorizationRecordStore, IdentityProvider};

use super::{AuthorizationSyncListener, DiagnosticsSnapshot, SnapshotOutcome, SnapshotSink, SyncDiagnostics};

struct Inner {
    state: SessionState,
    /// Bumped by every sign-in and sign-out; only the latest sign-in attempt
    /// may install its identity.
    attempt: u64,
}

/// Owner of the live `SessionState`. Every mutation goes through one of the
/// methods below and republishes the state on the change channel.
struct SessionCore {
    inner: Mutex<Inner>,
    changes: watch::Sender<SessionState>,
    diagnostics: SyncDiagnostics,
}

impl SessionCore {
    fn new() -> Self {
        let (changes, _) = watch::channel(SessionState::signed_out());
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::signed_out(),
                attempt: 0,
            }),
            changes,
            diagnostics: SyncDiagnostics::default(),
        }
    }

    fn replace(&self, inner: &mut Inner, next: SessionState) {
        if inner.state == next {
            return;
        }
        tracing::debug!(from = %inner.state.phase(), to = %next.phase(), "session phase transition");
        inner.state = next.clone();
        self.changes.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn begin_sign_in(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.attempt += 1;
        let attempt = inner.attempt;
        self.replace(&mut inner, SessionState::authenticating());
        attempt
    }

    /// Installs the identity if `attempt` is still the current sign-in.
    fn complete_sign_in(&self, attempt: u64, identity: Identity) -> bool {
        let mut inner = self.inner.lock();
        if inner.attempt != attempt || inner.state.phase() != SessionPhase::Authenticating {
            return false;
        }
        self.replace(&mut inner, SessionState::awaiting_record(identity));
        true
    }

    fn fail_sign_in(&self, attempt: u64) {
        let mut inner = self.inner.lock();
        if inner.attempt == attempt && inner.state.phase() == SessionPhase::Authenticating {
            self.replace(&mut inner, SessionState::signed_out());
        }
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.attempt += 1;
        self.replace(&mut inner, SessionState::signed_out());
    }

    fn apply(&self, record: AuthorizationRecord) -> SnapshotOutcome {
        let mut inner = self.inner.lock();

        let Some(identity) = inner.state.identity().cloned() else {
            return SnapshotOutcome::NoActiveIdentity;
        };
        if identity.uid != record.uid {
            return SnapshotOutcome::UidMismatchDiscarded;
        }
        if let Some(last) = inner.state.last_record_version() {
            if record.updated_at <= last {
                return SnapshotOutcome::StaleDiscarded;
            }
        }

        self.replace(&mut inner, SessionState::with_record(identity, record));
        SnapshotOutcome::Applied
    }

    fn state(&self) -> SessionState {
        self.inner.lock().state.clone()
    }
}

impl SnapshotSink for SessionCore {
    fn apply_record_snapshot(&self, record: AuthorizationRecord) -> SnapshotOutcome {
        let uid = record.uid.clone();
        let version = record.updated_at;
        let outcome = self.apply(record);
        self.diagnostics.record(outcome);

        match outcome {
            SnapshotOutcome::Applied => {
                tracing::debug!(uid = %uid, version = %version, "authorization record applied")
            }
            SnapshotOutcome::StaleDiscarded => {
                tracing::debug!(uid = %uid, version = %version, "stale authorization snapshot discarded")
            }
            SnapshotOutcome::UidMismatchDiscarded | SnapshotOutcome::NoActiveIdentity => {
                tracing::warn!(uid = %uid, outcome = ?outcome, "authorization snapshot for inactive uid discarded")
            }
        }
        outcome
    }
}

/// The session store: signs users in and out, keeps the record subscription
/// bound to the signed-in uid, and merges record snapshots into the state.
pub struct SessionStore {
    core: Arc<SessionCore>,
    identity: Arc<dyn IdentityProvider>,
    // Lock order: listener, then core state.
    listener: Mutex<AuthorizationSyncListener>,
}

impl SessionStore {
    pub fn new(identity: Arc<dyn IdentityProvider>, records: Arc<dyn AuthorizationRecordStore>) -> Self {
        let core = Arc::new(SessionCore::new());
        let sink: Arc<dyn SnapshotSink> = core.clone();
        Self {
            core,
            identity,
            listener: Mutex::new(AuthorizationSyncListener::new(records, sink)),
        }
    }

    /// Sign in through the identity provider. Any current session is replaced.
    ///
    /// On success the phase is `AwaitingRecord` and the record subscription for
    /// the new uid is attached. If a sign-out or another sign-in happened while
    /// the provider was working, the identity is dropped and
    /// `IdentityError::Superseded` is returned.
    pub async fn sign_in(&self) -> IdentityResult<Identity> {
        let attempt = self.begin_sign_in();

        match self.identity.sign_in().await {
            Ok(identity) => {
                self.finish_sign_in(attempt, &identity)?;
                tracing::info!(uid = %identity.uid, provider = %identity.provider_id, "signed in");
                Ok(identity)
            }
            Err(err) => {
                self.core.fail_sign_in(attempt);
                tracing::warn!(error = %err, "sign-in failed");
                Err(err)
            }
        }
    }

    /// Sign out from any phase. Local state is torn down before the provider is
    /// told, so late snapshots already find no identity.
    pub async fn sign_out(&self) {
        let uid = self.teardown();

        if let Err(err) = self.identity.sign_out().await {
            tracing::warn!(error = %err, "identity provider sign-out failed");
        }
        tracing::info!(uid = ?uid, "signed out");
    }

    /// Entry point for the sync listener.
    pub fn apply_record_snapshot(&self, record: AuthorizationRecord) -> SnapshotOutcome {
        self.core.apply_record_snapshot(record)
    }

    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.core.changes.subscribe()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.core.diagnostics.snapshot()
    }

    pub fn listening_uid(&self) -> Option<String> {
        self.listener.lock().attached_uid().map(str::to_string)
    }

    fn begin_sign_in(&self) -> u64 {
        let mut listener = self.listener.lock();
        listener.detach();
        let attempt = self.core.begin_sign_in();
        self.check_subscription(&listener);
        attempt
    }

    fn finish_sign_in(&self, attempt: u64, identity: &Identity) -> IdentityResult<()> {
        let mut listener = self.listener.lock();
        if !self.core.complete_sign_in(attempt, identity.clone()) {
            tracing::info!(uid = %identity.uid, "discarding identity from superseded sign-in");
            return Err(IdentityError::Superseded);
        }
        listener.attach(&identity.uid);
        self.check_subscription(&listener);
        Ok(())
    }

    fn teardown(&self) -> Option<String> {
        let mut listener = self.listener.lock();
        let uid = self.core.state().uid().map(str::to_string);
        listener.detach();
        self.core.clear();
        self.check_subscription(&listener);
        uid
    }

    /// The subscription is attached exactly while the phase wants one.
    fn check_subscription(&self, listener: &AuthorizationSyncListener) {
        debug_assert_eq!(
            listener.is_attached(),
            self.core.state().phase().wants_subscription(),
            "record subscription out of step with session phase"
        );
    }
}
