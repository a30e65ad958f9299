use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use s_curve_gate::config::{GateConfig, RecordStoreConfig, RouteNames};
use s_curve_gate::errors::{IdentityError, SyncResult};
use s_curve_gate::models::{AuthorizationRecord, Identity, RecordDefaults, Role, SessionPhase};
use s_curve_gate::providers::memory::{MemoryIdentityProvider, MemoryNavigator, MemoryRecordStore};
use s_curve_gate::providers::{AuthorizationRecordStore, SnapshotCallback, Unsubscribe};
use s_curve_gate::session::SnapshotOutcome;
use s_curve_gate::{create_gate, NavigationDecision, Route, ScreenRequirement, SessionStore};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn developer() -> Identity {
    Identity::new("dev-1", "dev@example.com").with_display_name("Dev")
}

#[tokio::test]
async fn fresh_app_redirects_to_login() -> Result<()> {
    let gate = create_gate(
        GateConfig::default(),
        Arc::new(MemoryIdentityProvider::with_identity(developer())),
        Arc::new(MemoryRecordStore::new()),
    );

    assert_eq!(gate.state().phase(), SessionPhase::SignedOut);
    assert_eq!(gate.decision(true), NavigationDecision::RedirectTo(Route::Login));
    Ok(())
}

#[tokio::test]
async fn unapproved_developer_waits_then_renders_after_approval() -> Result<()> {
    let records = Arc::new(MemoryRecordStore::new());
    records.put_record(&AuthorizationRecord::new("dev-1", Role::Member, false, at(1)));

    let gate = create_gate(
        GateConfig::default(),
        Arc::new(MemoryIdentityProvider::with_identity(developer())),
        records.clone(),
    );
    let navigator = Arc::new(MemoryNavigator::starting_at("Login"));
    let mut screen = gate.screen_gate(ScreenRequirement::approved_only(), navigator.clone());

    gate.sign_in().await?;
    assert_eq!(gate.state().phase(), SessionPhase::Unapproved);
    assert_eq!(screen.evaluate(&gate.state()), NavigationDecision::RedirectTo(Route::PendingApproval));
    assert_eq!(navigator.resets(), vec!["PendingApproval".to_string()]);

    records.set_approval("dev-1", true, at(2))?;
    assert_eq!(gate.state().phase(), SessionPhase::Approved);
    assert_eq!(screen.evaluate(&gate.state()), NavigationDecision::Render);
    assert_eq!(screen.evaluate(&gate.state()), NavigationDecision::Render);
    assert_eq!(navigator.reset_count(), 1);
    Ok(())
}

#[tokio::test]
async fn unapproved_user_may_open_screens_without_approval_requirement() -> Result<()> {
    let records = Arc::new(MemoryRecordStore::new());
    let gate = create_gate(
        GateConfig::default(),
        Arc::new(MemoryIdentityProvider::with_identity(developer())),
        records.clone(),
    );

    gate.sign_in().await?;
    // First sign-in provisions a pending member record.
    let record = gate.state().record().cloned().context("record not delivered")?;
    assert_eq!(record.role, Role::Member);
    assert!(!record.approved);

    assert_eq!(gate.decision(false), NavigationDecision::Render);
    assert_eq!(gate.decision(true), NavigationDecision::RedirectTo(Route::PendingApproval));
    Ok(())
}

#[tokio::test]
async fn revocation_sends_user_back_to_pending() -> Result<()> {
    let records = Arc::new(MemoryRecordStore::new());
    records.put_record(&AuthorizationRecord::new("dev-1", Role::Member, true, at(1)));
    let gate = create_gate(
        GateConfig::default(),
        Arc::new(MemoryIdentityProvider::with_identity(developer())),
        records.clone(),
    );
    let navigator = Arc::new(MemoryNavigator::starting_at("Main"));
    let mut screen = gate.screen_gate(ScreenRequirement::approved_only(), navigator.clone());

    gate.sign_in().await?;
    assert_eq!(screen.evaluate(&gate.state()), NavigationDecision::Render);

    records.set_approval("dev-1", false, at(2))?;
    assert_eq!(gate.state().phase(), SessionPhase::Unapproved);
    assert_eq!(screen.evaluate(&gate.state()), NavigationDecision::RedirectTo(Route::PendingApproval));

    // A replay of the approved snapshot must not undo the revocation.
    records.redeliver("dev-1", AuthorizationRecord::new("dev-1", Role::Member, true, at(1)).to_document());
    assert_eq!(gate.state().phase(), SessionPhase::Unapproved);
    assert_eq!(gate.diagnostics().stale_discarded, 1);
    Ok(())
}

#[tokio::test]
async fn admin_on_allow_list_is_approved_on_first_sign_in() -> Result<()> {
    let records = Arc::new(MemoryRecordStore::new());
    let config = GateConfig::default().with_admin_email("BOSS@example.com");
    let gate = create_gate(
        config,
        Arc::new(MemoryIdentityProvider::with_identity(Identity::new("boss-1", "boss@example.com"))),
        records.clone(),
    );

    gate.sign_in().await?;
    assert_eq!(gate.state().phase(), SessionPhase::Approved);
    assert!(gate.state().is_admin());
    Ok(())
}

/// Record store whose unsubscribe never takes effect, so deliveries keep
/// arriving after the session let go of the subscription.
#[derive(Default)]
struct LaggingRecordStore {
    callbacks: Mutex<Vec<(String, SnapshotCallback)>>,
}

impl LaggingRecordStore {
    fn push(&self, record: AuthorizationRecord) {
        let callbacks: Vec<SnapshotCallback> = self
            .callbacks
            .lock()
            .iter()
            .filter(|(uid, _)| *uid == record.uid)
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(record.clone());
        }
    }
}

#[async_trait]
impl AuthorizationRecordStore for LaggingRecordStore {
    async fn get(&self, _uid: &str) -> SyncResult<Option<AuthorizationRecord>> {
        Ok(None)
    }

    fn watch(&self, uid: &str, on_snapshot: SnapshotCallback) -> Unsubscribe {
        self.callbacks.lock().push((uid.to_string(), on_snapshot));
        Unsubscribe::noop()
    }

    async fn create(&self, _uid: &str, _defaults: RecordDefaults) -> SyncResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn delivery_after_sign_out_is_discarded() -> Result<()> {
    let records = Arc::new(LaggingRecordStore::default());
    let store = SessionStore::new(Arc::new(MemoryIdentityProvider::with_identity(developer())), records.clone());

    store.sign_in().await?;
    records.push(AuthorizationRecord::new("dev-1", Role::Member, false, at(1)));
    assert_eq!(store.phase(), SessionPhase::Unapproved);

    store.sign_out().await;
    records.push(AuthorizationRecord::new("dev-1", Role::Member, true, at(2)));

    assert_eq!(store.phase(), SessionPhase::SignedOut);
    assert!(store.state().record().is_none());
    assert_eq!(store.diagnostics().no_identity_discarded, 1);
    Ok(())
}

#[tokio::test]
async fn stale_listener_from_previous_account_cannot_leak_into_new_session() -> Result<()> {
    let records = Arc::new(LaggingRecordStore::default());
    let provider = Arc::new(MemoryIdentityProvider::with_identity(developer()));
    let store = SessionStore::new(provider.clone(), records.clone());

    store.sign_in().await?;
    store.sign_out().await;

    provider.set_identity(Identity::new("other-2", "other@example.com"));
    store.sign_in().await?;
    records.push(AuthorizationRecord::new("dev-1", Role::Admin, true, at(5)));

    assert_eq!(store.phase(), SessionPhase::AwaitingRecord);
    assert_eq!(store.diagnostics().uid_mismatch_discarded, 1);
    assert_eq!(
        store.apply_record_snapshot(AuthorizationRecord::new("other-2", Role::Member, true, at(6))),
        SnapshotOutcome::Applied
    );
    assert_eq!(store.phase(), SessionPhase::Approved);
    Ok(())
}

#[tokio::test]
async fn strict_wire_store_keeps_record_without_approval_flag_out() -> Result<()> {
    let document = serde_json::json!({ "role": "developer", "updatedAt": at(1).to_rfc3339() });

    let lenient = Arc::new(MemoryRecordStore::from_config(&RecordStoreConfig::default()));
    lenient.put_document("dev-1", document.clone());
    let gate = create_gate(
        GateConfig::default(),
        Arc::new(MemoryIdentityProvider::with_identity(developer())),
        lenient,
    );
    gate.sign_in().await?;
    assert_eq!(gate.state().phase(), SessionPhase::Unapproved);

    let strict = Arc::new(MemoryRecordStore::from_config(&RecordStoreConfig { strict_wire: true }));
    strict.put_document("dev-1", document);
    let gate = create_gate(
        GateConfig::default(),
        Arc::new(MemoryIdentityProvider::with_identity(developer())),
        strict.clone(),
    );
    gate.sign_in().await?;

    assert_eq!(gate.state().phase(), SessionPhase::AwaitingRecord);
    assert_eq!(gate.session().listening_uid().as_deref(), Some("dev-1"));
    assert_eq!(strict.watcher_count("dev-1"), 1);
    assert_eq!(gate.decision(true), NavigationDecision::RedirectTo(Route::Login));
    // The undecodable document is left alone rather than overwritten.
    assert!(strict.document("dev-1").context("document removed")?.get("approved").is_none());
    Ok(())
}

#[tokio::test]
async fn pending_approval_screen_moves_to_main_once_approved() -> Result<()> {
    let records = Arc::new(MemoryRecordStore::new());
    let config = GateConfig {
        routes: RouteNames {
            main: "Dashboard".to_string(),
            ..RouteNames::default()
        },
        ..GateConfig::default()
    };
    let gate = create_gate(
        config,
        Arc::new(MemoryIdentityProvider::with_identity(developer())),
        records.clone(),
    );
    assert_eq!(gate.config().routes.name(Route::Main), "Dashboard");

    gate.sign_in().await?;
    let navigator = Arc::new(MemoryNavigator::starting_at("PendingApproval"));
    let mut screen = gate.holding_gate(Route::PendingApproval, navigator.clone());

    assert_eq!(screen.evaluate(&gate.state()), NavigationDecision::Render);
    assert_eq!(navigator.reset_count(), 0);

    let created = gate.state().last_record_version().context("record not delivered")?;
    records.set_approval("dev-1", true, created + chrono::Duration::seconds(1))?;
    assert_eq!(screen.evaluate(&gate.state()), NavigationDecision::RedirectTo(Route::Main));
    assert_eq!(navigator.resets(), vec!["Dashboard".to_string()]);
    Ok(())
}

/// Record store whose lookups wait for the test to release them, so the
/// session can change while first-record provisioning is in flight.
struct HeldRecordStore {
    inner: MemoryRecordStore,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl AuthorizationRecordStore for HeldRecordStore {
    async fn get(&self, uid: &str) -> SyncResult<Option<AuthorizationRecord>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.get(uid).await
    }

    fn watch(&self, uid: &str, on_snapshot: SnapshotCallback) -> Unsubscribe {
        self.inner.watch(uid, on_snapshot)
    }

    async fn create(&self, uid: &str, defaults: RecordDefaults) -> SyncResult<()> {
        self.inner.create(uid, defaults).await
    }
}

#[tokio::test]
async fn sign_out_during_provisioning_supersedes_sign_in() -> Result<()> {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let records = Arc::new(HeldRecordStore {
        inner: MemoryRecordStore::new(),
        entered: entered.clone(),
        release: release.clone(),
    });
    let gate = Arc::new(create_gate(
        GateConfig::default(),
        Arc::new(MemoryIdentityProvider::with_identity(developer())),
        records.clone(),
    ));

    let pending = tokio::spawn({
        let gate = Arc::clone(&gate);
        async move { gate.sign_in().await }
    });
    tokio::time::timeout(std::time::Duration::from_secs(1), entered.notified()).await?;
    assert_eq!(gate.state().phase(), SessionPhase::AwaitingRecord);

    gate.sign_out().await;
    release.notify_one();

    assert_eq!(pending.await?, Err(IdentityError::Superseded));
    assert_eq!(gate.state().phase(), SessionPhase::SignedOut);
    assert_eq!(records.inner.total_watchers(), 0);
    Ok(())
}
