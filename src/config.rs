use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::authz::Route;
use crate::errors::ConfigError;
use crate::utils::normalize_email;

pub const ADMIN_EMAILS_KEY: &str = "GATE_ADMIN_EMAILS";
pub const ROUTE_LOGIN_KEY: &str = "GATE_ROUTE_LOGIN";
pub const ROUTE_PENDING_KEY: &str = "GATE_ROUTE_PENDING";
pub const ROUTE_MAIN_KEY: &str = "GATE_ROUTE_MAIN";
pub const STRICT_WIRE_KEY: &str = "GATE_STRICT_WIRE";

/// Screen names the navigation controller knows the gate's targets by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNames {
    pub login: String,
    pub pending_approval: String,
    pub main: String,
}

impl Default for RouteNames {
    fn default() -> Self {
        Self {
            login: "Login".to_string(),
            pending_approval: "PendingApproval".to_string(),
            main: "Main".to_string(),
        }
    }
}

impl RouteNames {
    pub fn name(&self, route: Route) -> &str {
        match route {
            Route::Login => &self.login,
            Route::PendingApproval => &self.pending_approval,
            Route::Main => &self.main,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateConfig {
    /// Lower-cased emails that get the admin role when their record is first created.
    pub admin_emails: HashSet<String>,
    pub routes: RouteNames,
}

impl GateConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read a dotenv-style file without touching the process environment.
    pub fn from_dotenv_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let values = read_dotenv(path.as_ref())?;
        Self::from_lookup(|key| values.get(key).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let admin_emails: HashSet<String> = lookup(ADMIN_EMAILS_KEY)
            .map(|raw| {
                raw.split(',')
                    .map(normalize_email)
                    .filter(|email| !email.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let defaults = RouteNames::default();
        let routes = RouteNames {
            login: route_name(&lookup, ROUTE_LOGIN_KEY, defaults.login)?,
            pending_approval: route_name(&lookup, ROUTE_PENDING_KEY, defaults.pending_approval)?,
            main: route_name(&lookup, ROUTE_MAIN_KEY, defaults.main)?,
        };

        Ok(Self { admin_emails, routes })
    }

    pub fn with_admin_email(mut self, email: &str) -> Self {
        self.admin_emails.insert(normalize_email(email));
        self
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.contains(&normalize_email(email))
    }
}

/// Settings for the record store adapter, which is where wire documents are
/// decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStoreConfig {
    /// Reject records without an explicit `approved` field instead of reading
    /// them as unapproved.
    pub strict_wire: bool,
}

impl RecordStoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_dotenv_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let values = read_dotenv(path.as_ref())?;
        Self::from_lookup(|key| values.get(key).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let strict_wire = match lookup(STRICT_WIRE_KEY) {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| ConfigError::invalid(format!("{STRICT_WIRE_KEY} must be true or false")))?,
            None => false,
        };
        Ok(Self { strict_wire })
    }
}

fn read_dotenv(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let mut values = HashMap::new();
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        values.insert(key, value);
    }
    Ok(values)
}

fn route_name(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: String,
) -> Result<String, ConfigError> {
    match lookup(key) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::invalid(format!("{key} must not be empty"))),
        Some(value) => Ok(value.trim().to_string()),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
