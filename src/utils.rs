use chrono::{DateTime, Utc};

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
