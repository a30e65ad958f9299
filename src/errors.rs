use serde::Serialize;

pub type IdentityResult<T> = Result<T, IdentityError>;
pub type SyncResult<T> = Result<T, RecordSyncError>;

/// Failures surfaced to the caller of `sign_in`. These are the only errors that
/// cross the session boundary; everything record-related is absorbed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("sign-in cancelled by user")]
    UserCancelled,
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("sign-in superseded by a later sign-in or sign-out")]
    Superseded,
}

impl IdentityError {
    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Message shown on the Login screen.
    pub fn user_message(&self) -> &'static str {
        match self {
            IdentityError::UserCancelled => "Sign-in was cancelled. Tap the button to try again.",
            IdentityError::ProviderUnavailable(_) => {
                "The sign-in service is unavailable right now. Please try again later."
            }
            IdentityError::Network(_) => "Check your internet connection and try again.",
            IdentityError::Superseded => "Sign-in was interrupted. Please try again.",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::UserCancelled => "user_cancelled",
            IdentityError::ProviderUnavailable(_) => "provider_unavailable",
            IdentityError::Network(_) => "network",
            IdentityError::Superseded => "superseded",
        }
    }
}

/// Payload handed to the UI when sign-in fails.
#[derive(Debug, Clone, Serialize)]
pub struct SignInFailure {
    pub error: String,
    pub message: String,
}

impl From<&IdentityError> for SignInFailure {
    fn from(value: &IdentityError) -> Self {
        Self {
            error: value.code().to_string(),
            message: value.user_message().to_string(),
        }
    }
}

/// Problems on the authorization record channel. Handled internally and logged,
/// never shown to the user.
#[derive(thiserror::Error, Debug)]
pub enum RecordSyncError {
    #[error("record store error: {0}")]
    Store(String),
    #[error(transparent)]
    Decode(#[from] RecordDecodeError),
}

impl RecordSyncError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}

/// A remote document that could not be coerced into an `AuthorizationRecord`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordDecodeError {
    #[error("invalid record field `{path}`: {message}")]
    InvalidField { path: String, message: String },
    #[error("record uid `{found}` does not match document key `{key}`")]
    KeyMismatch { key: String, found: String },
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),
}

impl RecordDecodeError {
    pub fn invalid_field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Invalid(String),
    #[error("failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
