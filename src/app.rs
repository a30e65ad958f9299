use std::sync::Arc;

use tokio::sync::watch;

use crate::authz::{self, NavigationDecision, Route, ScreenGate, ScreenRequirement};
use crate::config::GateConfig;
use crate::errors::{IdentityError, IdentityResult};
use crate::models::{Identity, SessionState};
use crate::providers::{AuthorizationRecordStore, IdentityProvider, NavigationController};
use crate::provisioning::{ProvisionOutcome, RecordProvisioner};
use crate::session::{DiagnosticsSnapshot, SessionStore};

/// Session store, first-record provisioning and route configuration wired
/// together for the screens of the app.
pub struct SessionGate {
    config: GateConfig,
    session: Arc<SessionStore>,
    provisioner: RecordProvisioner,
}

pub fn create_gate(
    config: GateConfig,
    identity: Arc<dyn IdentityProvider>,
    records: Arc<dyn AuthorizationRecordStore>,
) -> SessionGate {
    let session = Arc::new(SessionStore::new(identity, Arc::clone(&records)));
    let provisioner = RecordProvisioner::new(records, config.admin_emails.clone());
    SessionGate {
        config,
        session,
        provisioner,
    }
}

impl SessionGate {
    /// Sign in, then make sure the user has an authorization record.
    ///
    /// Provisioning problems are logged only; the session stays in
    /// `AwaitingRecord` and screens keep redirecting to Login. A sign-out or
    /// newer sign-in that lands while the record is being provisioned wins,
    /// and this call reports `Superseded`.
    pub async fn sign_in(&self) -> IdentityResult<Identity> {
        let identity = self.session.sign_in().await?;

        match self.provisioner.ensure_record(&identity).await {
            Ok(ProvisionOutcome::Existing) => {}
            Ok(ProvisionOutcome::Created(role)) => {
                tracing::debug!(uid = %identity.uid, role = %role.as_str(), "first sign-in");
            }
            Err(err) => {
                tracing::error!(uid = %identity.uid, error = %err, "failed to provision authorization record");
            }
        }

        if self.session.state().uid() != Some(identity.uid.as_str()) {
            tracing::info!(uid = %identity.uid, "session changed while provisioning; dropping sign-in result");
            return Err(IdentityError::Superseded);
        }

        Ok(identity)
    }

    pub async fn sign_out(&self) {
        self.session.sign_out().await;
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    pub fn session(&self) -> Arc<SessionStore> {
        Arc::clone(&self.session)
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.session.diagnostics()
    }

    pub fn decision(&self, require_approval: bool) -> NavigationDecision {
        authz::use_session_decision(&self.session, require_approval)
    }

    pub fn screen_gate(&self, requirement: ScreenRequirement, navigator: Arc<dyn NavigationController>) -> ScreenGate {
        ScreenGate::protected(requirement, self.config.routes.clone(), navigator)
    }

    pub fn holding_gate(&self, screen: Route, navigator: Arc<dyn NavigationController>) -> ScreenGate {
        ScreenGate::holding(screen, self.config.routes.clone(), navigator)
    }
}
