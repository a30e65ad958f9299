use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::RecordDecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    /// Stored as `"developer"` on the wire.
    #[serde(rename = "developer")]
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "developer",
        }
    }

    /// Lenient parse used at the store boundary. Accepts both the wire name and
    /// the domain name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "developer" | "member" => Some(Role::Member),
            _ => None,
        }
    }
}

/// Role and approval state for one uid, as held by the remote record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRecord {
    pub uid: String,
    pub role: Role,
    pub approved: bool,
    pub updated_at: DateTime<Utc>,
}

impl AuthorizationRecord {
    pub fn new(uid: impl Into<String>, role: Role, approved: bool, updated_at: DateTime<Utc>) -> Self {
        Self {
            uid: uid.into(),
            role,
            approved,
            updated_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Coerce a raw document stored under `key` into a typed record.
    ///
    /// A missing `uid` is filled from the key; a present one must equal it.
    /// A missing `approved` reads as `false` unless `strict` is set.
    /// `updatedAt` is required since it orders snapshots.
    pub fn from_document(key: &str, document: &Value, strict: bool) -> Result<Self, RecordDecodeError> {
        let wire: WireRecord = serde_path_to_error::deserialize(document).map_err(|err| {
            RecordDecodeError::invalid_field(err.path().to_string(), err.inner().to_string())
        })?;

        let uid = match wire.uid {
            Some(uid) if uid != key => {
                return Err(RecordDecodeError::KeyMismatch {
                    key: key.to_string(),
                    found: uid,
                })
            }
            Some(uid) => uid,
            None => key.to_string(),
        };

        let role = Role::parse(&wire.role).ok_or_else(|| {
            RecordDecodeError::invalid_field("role", format!("unknown role `{}`", wire.role))
        })?;

        let approved = match wire.approved {
            Some(approved) => approved,
            None if strict => return Err(RecordDecodeError::MissingField("approved")),
            None => false,
        };

        let updated_at = wire
            .updated_at
            .ok_or(RecordDecodeError::MissingField("updatedAt"))?
            .into_utc()?;

        Ok(Self {
            uid,
            role,
            approved,
            updated_at,
        })
    }

    pub fn to_document(&self) -> Value {
        json!({
            "uid": self.uid,
            "role": self.role.as_str(),
            "approved": self.approved,
            "updatedAt": self.updated_at.to_rfc3339(),
        })
    }
}

/// Values written when the first record for a uid is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordDefaults {
    pub role: Role,
    pub approved: bool,
    pub updated_at: DateTime<Utc>,
}

impl RecordDefaults {
    pub fn into_record(self, uid: impl Into<String>) -> AuthorizationRecord {
        AuthorizationRecord::new(uid, self.role, self.approved, self.updated_at)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    #[serde(default)]
    uid: Option<String>,
    role: String,
    #[serde(default)]
    approved: Option<bool>,
    #[serde(default)]
    updated_at: Option<WireTimestamp>,
}

/// Timestamps arrive either as ISO-8601 strings, as `{seconds, nanoseconds}`
/// objects, or as epoch milliseconds depending on which client wrote them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Iso(DateTime<Utc>),
    Parts {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: u32,
    },
    Millis(i64),
}

impl WireTimestamp {
    fn into_utc(self) -> Result<DateTime<Utc>, RecordDecodeError> {
        let converted = match self {
            WireTimestamp::Iso(at) => Some(at),
            WireTimestamp::Parts { seconds, nanoseconds } => DateTime::from_timestamp(seconds, nanoseconds),
            WireTimestamp::Millis(millis) => DateTime::from_timestamp_millis(millis),
        };
        converted.ok_or_else(|| RecordDecodeError::invalid_field("updatedAt", "timestamp out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_wire_shape() {
        let doc = json!({
            "uid": "u1",
            "role": "developer",
            "approved": true,
            "updatedAt": "2024-03-01T10:00:00+02:00"
        });
        let record = AuthorizationRecord::from_document("u1", &doc, true).unwrap();
        assert_eq!(record.role, Role::Member);
        assert!(record.approved);
        assert_eq!(record.updated_at, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn fills_uid_from_key_and_defaults_approval_to_false() {
        let doc = json!({"role": "Admin", "updatedAt": {"_seconds": 1_700_000_000, "_nanoseconds": 5}});
        let record = AuthorizationRecord::from_document("u9", &doc, false).unwrap();
        assert_eq!(record.uid, "u9");
        assert_eq!(record.role, Role::Admin);
        assert!(!record.approved);
        assert_eq!(record.updated_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn strict_mode_requires_approved() {
        let doc = json!({"role": "admin", "updatedAt": 1_700_000_000_000_i64});
        let err = AuthorizationRecord::from_document("u1", &doc, true).unwrap_err();
        assert_eq!(err, RecordDecodeError::MissingField("approved"));
    }

    #[test]
    fn rejects_foreign_uid_and_unknown_role() {
        let foreign = json!({"uid": "u2", "role": "admin", "approved": true, "updatedAt": 1});
        assert!(matches!(
            AuthorizationRecord::from_document("u1", &foreign, false),
            Err(RecordDecodeError::KeyMismatch { .. })
        ));

        let unknown = json!({"role": "owner", "approved": true, "updatedAt": 1});
        let err = AuthorizationRecord::from_document("u1", &unknown, false).unwrap_err();
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn reports_path_of_mistyped_field() {
        let doc = json!({"role": "admin", "approved": "yes", "updatedAt": 1});
        match AuthorizationRecord::from_document("u1", &doc, false) {
            Err(RecordDecodeError::InvalidField { path, .. }) => assert_eq!(path, "approved"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn document_round_trip_keeps_wire_role_name() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = AuthorizationRecord::new("u1", Role::Member, false, at);
        let doc = record.to_document();
        assert_eq!(doc["role"], "developer");
        assert_eq!(AuthorizationRecord::from_document("u1", &doc, true).unwrap(), record);
    }
}
