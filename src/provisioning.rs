use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::{RecordSyncError, SyncResult};
use crate::models::{Identity, RecordDefaults, Role};
use crate::providers::AuthorizationRecordStore;
use crate::utils::{normalize_email, utc_now};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Existing,
    Created(Role),
}

/// Creates the authorization record on a user's first sign-in.
///
/// The role comes from the admin allow-list and is assigned exactly once;
/// afterwards role and approval only change through administrative action.
pub struct RecordProvisioner {
    records: Arc<dyn AuthorizationRecordStore>,
    admin_emails: HashSet<String>,
}

impl RecordProvisioner {
    pub fn new(records: Arc<dyn AuthorizationRecordStore>, admin_emails: HashSet<String>) -> Self {
        Self { records, admin_emails }
    }

    pub fn defaults_for(&self, identity: &Identity) -> RecordDefaults {
        let is_admin = self.admin_emails.contains(&normalize_email(&identity.email));
        RecordDefaults {
            role: if is_admin { Role::Admin } else { Role::Member },
            approved: is_admin,
            updated_at: utc_now(),
        }
    }

    pub async fn ensure_record(&self, identity: &Identity) -> SyncResult<ProvisionOutcome> {
        if self.records.get(&identity.uid).await?.is_some() {
            return Ok(ProvisionOutcome::Existing);
        }

        let defaults = self.defaults_for(identity);
        match self.records.create(&identity.uid, defaults).await {
            Ok(()) => {
                tracing::info!(uid = %identity.uid, role = %defaults.role.as_str(), "authorization record created");
                Ok(ProvisionOutcome::Created(defaults.role))
            }
            // Lost a race with another device creating the same record.
            Err(RecordSyncError::Store(message)) => {
                if self.records.get(&identity.uid).await?.is_some() {
                    Ok(ProvisionOutcome::Existing)
                } else {
                    Err(RecordSyncError::Store(message))
                }
            }
            Err(err) => Err(err),
        }
    }
}
