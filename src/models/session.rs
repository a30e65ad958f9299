use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AuthorizationRecord, Identity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionPhase {
    SignedOut,
    Authenticating,
    AwaitingRecord,
    Unapproved,
    Approved,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::SignedOut => "signed_out",
            SessionPhase::Authenticating => "authenticating",
            SessionPhase::AwaitingRecord => "awaiting_record",
            SessionPhase::Unapproved => "unapproved",
            SessionPhase::Approved => "approved",
        }
    }

    /// Phases during which the record subscription must be attached.
    pub fn wants_subscription(&self) -> bool {
        matches!(
            self,
            SessionPhase::AwaitingRecord | SessionPhase::Unapproved | SessionPhase::Approved
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merged view of who is signed in and what they may do.
///
/// Values handed out by the session store are copies; the store is the only
/// place a live `SessionState` is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub(crate) identity: Option<Identity>,
    pub(crate) record: Option<AuthorizationRecord>,
    pub(crate) phase: SessionPhase,
    pub(crate) last_record_version: Option<DateTime<Utc>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl SessionState {
    pub fn signed_out() -> Self {
        Self::derive(None, None, false)
    }

    pub fn authenticating() -> Self {
        Self::derive(None, None, true)
    }

    pub fn awaiting_record(identity: Identity) -> Self {
        Self::derive(Some(identity), None, false)
    }

    pub fn with_record(identity: Identity, record: AuthorizationRecord) -> Self {
        Self::derive(Some(identity), Some(record), false)
    }

    /// Rebuild the whole state from its two inputs.
    ///
    /// A record is only kept next to an identity with the same uid, and never
    /// without an identity.
    pub(crate) fn derive(
        identity: Option<Identity>,
        record: Option<AuthorizationRecord>,
        authenticating: bool,
    ) -> Self {
        let record = match (&identity, record) {
            (Some(identity), Some(record)) if record.uid == identity.uid => Some(record),
            _ => None,
        };

        let phase = match (&identity, &record) {
            (None, _) if authenticating => SessionPhase::Authenticating,
            (None, _) => SessionPhase::SignedOut,
            (Some(_), None) => SessionPhase::AwaitingRecord,
            (Some(_), Some(record)) if record.approved => SessionPhase::Approved,
            (Some(_), Some(_)) => SessionPhase::Unapproved,
        };

        let last_record_version = record.as_ref().map(|record| record.updated_at);

        Self {
            identity,
            record,
            phase,
            last_record_version,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn record(&self) -> Option<&AuthorizationRecord> {
        self.record.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn last_record_version(&self) -> Option<DateTime<Utc>> {
        self.last_record_version
    }

    pub fn uid(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.uid.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.record.as_ref().map(AuthorizationRecord::is_admin).unwrap_or(false)
    }

    /// True when the phase agrees with the identity and record it claims to
    /// be derived from.
    pub fn is_consistent(&self) -> bool {
        match self.phase {
            SessionPhase::SignedOut | SessionPhase::Authenticating => {
                self.identity.is_none() && self.record.is_none()
            }
            SessionPhase::AwaitingRecord => self.identity.is_some() && self.record.is_none(),
            SessionPhase::Unapproved | SessionPhase::Approved => match (&self.identity, &self.record) {
                (Some(identity), Some(record)) => {
                    identity.uid == record.uid
                        && record.approved == (self.phase == SessionPhase::Approved)
                        && self.last_record_version == Some(record.updated_at)
                }
                _ => false,
            },
        }
    }
}
